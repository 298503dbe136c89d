//! Prometheus metrics for dashboard observability.

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record an ingested provider event.
pub fn event_ingested(provider_kind: &str) {
    counter!("pw_events_ingested_total", "provider" => provider_kind.to_string()).increment(1);
}

/// Record a rejected (malformed) payload.
pub fn event_rejected(provider_kind: &str) {
    counter!("pw_events_rejected_total", "provider" => provider_kind.to_string()).increment(1);
}

/// Record a build upsert by resulting status.
pub fn build_upserted(status: &str) {
    counter!("pw_builds_upserted_total", "status" => status.to_string()).increment(1);
}

/// Record an alert dispatch attempt per channel.
pub fn alert_dispatched(channel: &str, success: bool) {
    let outcome = if success { "sent" } else { "failed" };
    counter!("pw_alerts_total", "channel" => channel.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record ingest handling latency.
pub fn ingest_latency(duration_ms: u64) {
    histogram!("pw_ingest_latency_ms").record(duration_ms as f64);
}
