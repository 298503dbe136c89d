//! Jenkins notification payload normalization.
//!
//! Jenkins reports timestamps in epoch milliseconds and signals completion
//! by the presence of a `result` (or `status`) string; a build without one
//! is still running.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::error::IngestError;
use crate::models::event::{BuildEvent, BuildStatus, ProviderKind};

fn malformed(detail: impl Into<String>) -> IngestError {
    IngestError::MalformedPayload {
        provider: "jenkins",
        detail: detail.into(),
    }
}

/// Map a Jenkins result string to the canonical status. SUCCESS maps to
/// success; any other present result (FAILURE, UNSTABLE, ABORTED, ...) is a
/// terminal failure; absence means the build has not finished.
fn map_result(result: Option<&str>) -> BuildStatus {
    match result {
        Some("SUCCESS") => BuildStatus::Success,
        Some(_) => BuildStatus::Failed,
        None => BuildStatus::Running,
    }
}

fn epoch_millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Normalize a Jenkins webhook payload (or a polled build wrapped in the
/// same `{"name": ..., "build": ...}` envelope).
pub fn normalize_jenkins(payload: &serde_json::Value) -> Result<BuildEvent, IngestError> {
    let build = payload.get("build").ok_or_else(|| malformed("missing build"))?;

    let external_id = build
        .get("number")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| malformed("missing build.number"))?
        .to_string();

    let result = build
        .get("result")
        .or_else(|| build.get("status"))
        .and_then(|v| v.as_str());
    let status = map_result(result);

    let started_at = build
        .get("timestamp")
        .or_else(|| payload.get("timestamp"))
        .and_then(|v| v.as_i64())
        .and_then(epoch_millis_to_utc);

    // Jenkins reports duration in millis; derive the finish instant from it
    // only once the build is terminal.
    let finished_at = if status.is_terminal() {
        match (started_at, build.get("duration").and_then(|v| v.as_i64())) {
            (Some(start), Some(duration_ms)) => {
                Some(start + chrono::Duration::milliseconds(duration_ms))
            }
            _ => None,
        }
    } else {
        None
    };

    let provider_name = payload
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("jenkins")
        .to_string();

    Ok(BuildEvent {
        provider_name,
        provider_kind: ProviderKind::Jenkins,
        external_id,
        status,
        branch: build
            .get("branch")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        commit_sha: build
            .get("commit")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        triggered_by: build
            .get("user")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        url: build.get("url").and_then(|v| v.as_str()).map(str::to_string),
        started_at,
        finished_at,
        raw_payload: payload.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_successful_build() {
        let payload = json!({
            "name": "deploy-api",
            "build": {
                "number": 42,
                "result": "SUCCESS",
                "branch": "main",
                "commit": "deadbeef",
                "user": "jane",
                "url": "https://jenkins.local/job/deploy-api/42/",
                "timestamp": 1705312800000i64,
                "duration": 90000
            }
        });

        let event = normalize_jenkins(&payload).unwrap();
        assert_eq!(event.provider_name, "deploy-api");
        assert_eq!(event.external_id, "42");
        assert_eq!(event.status, BuildStatus::Success);
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.triggered_by.as_deref(), Some("jane"));

        let duration = event.finished_at.unwrap() - event.started_at.unwrap();
        assert_eq!(duration.num_seconds(), 90);
    }

    #[test]
    fn non_success_result_is_failed() {
        for result in ["FAILURE", "UNSTABLE", "ABORTED"] {
            let payload = json!({"build": {"number": 7, "result": result}});
            let event = normalize_jenkins(&payload).unwrap();
            assert_eq!(event.status, BuildStatus::Failed, "result={result}");
        }
    }

    #[test]
    fn absent_result_means_running() {
        let payload = json!({"build": {"number": 8, "timestamp": 1705312800000i64}});
        let event = normalize_jenkins(&payload).unwrap();
        assert_eq!(event.status, BuildStatus::Running);
        assert!(event.started_at.is_some());
        assert!(event.finished_at.is_none());
    }

    #[test]
    fn missing_build_key_is_malformed() {
        let err = normalize_jenkins(&json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload { .. }));
    }

    #[test]
    fn epoch_millis_converts_to_utc() {
        let payload = json!({"build": {"number": 1, "timestamp": 1705312800000i64}});
        let event = normalize_jenkins(&payload).unwrap();
        assert_eq!(
            event.started_at.unwrap().to_rfc3339(),
            "2024-01-15T10:00:00+00:00"
        );
    }
}
