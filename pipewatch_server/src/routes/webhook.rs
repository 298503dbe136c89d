//! Ingest handler — receives provider payloads from webhook push or the
//! poller and drives them through the ingestion pipeline.

use std::time::Instant;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;

use crate::config::DashConfig;
use crate::models::error::{IngestError, StoreError};
use crate::models::event::ProviderKind;
use crate::services::{ingest, signature};

use super::api::IngestResponse;
use super::AppState;

/// Authenticate an inbound ingest request.
///
/// When a webhook secret is configured, GitHub deliveries must carry a
/// valid HMAC signature; an absent header fails just like a bad one.
/// Everything else (Jenkins, the poller) presents the write key in
/// `x-api-key`. An empty configured key disables the check.
fn authorize(config: &DashConfig, kind: ProviderKind, headers: &HeaderMap, body: &[u8]) -> bool {
    if kind == ProviderKind::GithubActions && !config.github_webhook_secret.is_empty() {
        let sig = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        return signature::validate_signature(&config.github_webhook_secret, body, sig);
    }

    if config.api_key.is_empty() {
        return true;
    }
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == config.api_key)
}

/// Handle one inbound event payload.
pub async fn handle_ingest(
    state: &AppState,
    provider: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<IngestResponse>) {
    let started = Instant::now();

    let kind: ProviderKind = match provider.parse() {
        Ok(kind) => kind,
        Err(_) => {
            let e = IngestError::UnknownProvider(provider.to_string());
            return (StatusCode::NOT_FOUND, Json(IngestResponse::rejected(e.to_string())));
        }
    };

    if !authorize(&state.config, kind, headers, &body) {
        tracing::warn!(provider = kind.as_str(), "Ingest authentication failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(IngestResponse::rejected("authentication failed")),
        );
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            crate::metrics::event_rejected(kind.as_str());
            return (
                StatusCode::BAD_REQUEST,
                Json(IngestResponse::rejected(format!("invalid JSON: {e}"))),
            );
        }
    };

    let mut conn = match state.pool.get().await {
        Ok(conn) => conn,
        Err(e) => {
            let e = StoreError::Pool(e.to_string());
            tracing::error!("Database pool unavailable: {e}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(IngestResponse::rejected("storage unavailable, retry")),
            );
        }
    };

    let result = ingest::ingest_event(&mut conn, &state.dispatcher, kind, &payload).await;
    crate::metrics::ingest_latency(started.elapsed().as_millis() as u64);

    match result {
        Ok(outcome) => (
            StatusCode::ACCEPTED,
            Json(IngestResponse::accepted(outcome.build.id)),
        ),
        Err(e @ IngestError::MalformedPayload { .. }) => {
            crate::metrics::event_rejected(kind.as_str());
            tracing::warn!(provider = kind.as_str(), "Rejected payload: {e}");
            (StatusCode::BAD_REQUEST, Json(IngestResponse::rejected(e.to_string())))
        }
        Err(e @ IngestError::UnknownProvider(_)) => {
            (StatusCode::BAD_REQUEST, Json(IngestResponse::rejected(e.to_string())))
        }
        Err(IngestError::Store(e)) => {
            tracing::error!(provider = kind.as_str(), "Storage failure during ingest: {e}");
            let status = match e {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(IngestResponse::rejected("storage error, retry")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;
    use hmac::Mac;

    fn config(api_key: &str, secret: &str) -> DashConfig {
        DashConfig {
            api_key: api_key.to_string(),
            github_webhook_secret: secret.to_string(),
            alert_on_success: false,
            alert_send_timeout_secs: 5,
            smtp: SmtpConfig::default(),
            slack_webhook_url: None,
            alert_webhook_url: None,
            default_window_days: 7,
        }
    }

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", sig.parse().unwrap());
        headers
    }

    #[test]
    fn github_with_secret_requires_signature_header() {
        // A missing signature must not fall through to the api-key check,
        // even when the api-key check itself is disabled.
        let cfg = config("", "s3cret");
        let headers = HeaderMap::new();
        assert!(!authorize(&cfg, ProviderKind::GithubActions, &headers, b"{}"));
    }

    #[test]
    fn github_with_secret_accepts_valid_signature() {
        let cfg = config("", "s3cret");
        let body = br#"{"workflow_run":{"id":1}}"#;
        let headers = signed_headers("s3cret", body);
        assert!(authorize(&cfg, ProviderKind::GithubActions, &headers, body));
    }

    #[test]
    fn github_with_secret_rejects_tampered_body() {
        let cfg = config("", "s3cret");
        let headers = signed_headers("s3cret", b"{}");
        assert!(!authorize(&cfg, ProviderKind::GithubActions, &headers, b"{tampered}"));
    }

    #[test]
    fn api_key_path_checks_key() {
        let cfg = config("write-key", "");
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "write-key".parse().unwrap());
        assert!(authorize(&cfg, ProviderKind::Jenkins, &headers, b"{}"));

        assert!(!authorize(&cfg, ProviderKind::Jenkins, &HeaderMap::new(), b"{}"));
    }

    #[test]
    fn empty_api_key_disables_check_for_non_github() {
        let cfg = config("", "");
        assert!(authorize(&cfg, ProviderKind::Jenkins, &HeaderMap::new(), b"{}"));
    }
}
