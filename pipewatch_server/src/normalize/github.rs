//! GitHub Actions `workflow_run` payload normalization.

use crate::models::error::IngestError;
use crate::models::event::{BuildEvent, BuildStatus, ProviderKind};

use super::parse_rfc3339;

fn malformed(detail: impl Into<String>) -> IngestError {
    IngestError::MalformedPayload {
        provider: "github_actions",
        detail: detail.into(),
    }
}

/// Map `workflow_run.status` + `conclusion` to the canonical status.
///
/// GitHub reports `status` as a lifecycle phase and `conclusion` only once
/// the run completed; anything completed without a `success` conclusion
/// (failure, cancelled, timed_out, ...) counts as failed.
fn map_status(status: &str, conclusion: Option<&str>) -> BuildStatus {
    match status {
        "completed" => match conclusion {
            Some("success") => BuildStatus::Success,
            _ => BuildStatus::Failed,
        },
        "in_progress" => BuildStatus::Running,
        // queued, waiting, requested, pending
        _ => BuildStatus::Queued,
    }
}

/// Normalize a GitHub Actions webhook payload (or a polled run wrapped in
/// the same `{"workflow_run": ...}` envelope).
pub fn normalize_github_actions(payload: &serde_json::Value) -> Result<BuildEvent, IngestError> {
    let run = payload
        .get("workflow_run")
        .ok_or_else(|| malformed("missing workflow_run"))?;

    let external_id = run
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| malformed("missing workflow_run.id"))?
        .to_string();

    let status_str = run.get("status").and_then(|v| v.as_str()).unwrap_or("");
    let conclusion = run.get("conclusion").and_then(|v| v.as_str());
    let status = map_status(status_str, conclusion);

    let triggered_by = run
        .pointer("/triggering_actor/login")
        .and_then(|v| v.as_str())
        .or_else(|| payload.pointer("/sender/login").and_then(|v| v.as_str()))
        .map(str::to_string);

    let started_at = run
        .get("run_started_at")
        .map(parse_rfc3339)
        .unwrap_or(None);

    // updated_at is only meaningful as a finish time once the run is terminal
    let finished_at = if status.is_terminal() {
        run.get("updated_at").map(parse_rfc3339).unwrap_or(None)
    } else {
        None
    };

    let provider_name = payload
        .pointer("/repository/full_name")
        .and_then(|v| v.as_str())
        .unwrap_or("github")
        .to_string();

    Ok(BuildEvent {
        provider_name,
        provider_kind: ProviderKind::GithubActions,
        external_id,
        status,
        branch: run
            .get("head_branch")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        commit_sha: run
            .pointer("/head_commit/id")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        triggered_by,
        url: run
            .get("html_url")
            .and_then(|v| v.as_str())
            .map(str::to_string),
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
    fn normalizes_completed_success_run() {
        let payload = json!({
            "workflow_run": {
                "id": 123,
                "status": "completed",
                "conclusion": "success",
                "head_branch": "main",
                "head_commit": {"id": "abc123"},
                "run_started_at": "2024-01-15T10:00:00Z",
                "updated_at": "2024-01-15T10:03:00Z"
            },
            "sender": {"login": "john"}
        });

        let event = normalize_github_actions(&payload).unwrap();
        assert_eq!(event.external_id, "123");
        assert_eq!(event.status, BuildStatus::Success);
        assert_eq!(event.branch.as_deref(), Some("main"));
        assert_eq!(event.commit_sha.as_deref(), Some("abc123"));
        assert_eq!(event.triggered_by.as_deref(), Some("john"));

        let duration = event.finished_at.unwrap() - event.started_at.unwrap();
        assert_eq!(duration.num_seconds(), 180);
    }

    #[test]
    fn completed_non_success_conclusion_is_failed() {
        for conclusion in ["failure", "cancelled", "timed_out", "startup_failure"] {
            let payload = json!({
                "workflow_run": {
                    "id": 9,
                    "status": "completed",
                    "conclusion": conclusion,
                }
            });
            let event = normalize_github_actions(&payload).unwrap();
            assert_eq!(event.status, BuildStatus::Failed, "conclusion={conclusion}");
        }
    }

    #[test]
    fn in_progress_run_has_no_finished_at() {
        let payload = json!({
            "workflow_run": {
                "id": 55,
                "status": "in_progress",
                "run_started_at": "2024-01-15T10:00:00Z",
                "updated_at": "2024-01-15T10:01:00Z"
            }
        });

        let event = normalize_github_actions(&payload).unwrap();
        assert_eq!(event.status, BuildStatus::Running);
        assert!(event.started_at.is_some());
        assert!(event.finished_at.is_none());
    }

    #[test]
    fn queued_statuses_map_to_queued() {
        for status in ["queued", "waiting", "requested", "pending"] {
            let payload = json!({"workflow_run": {"id": 1, "status": status}});
            let event = normalize_github_actions(&payload).unwrap();
            assert_eq!(event.status, BuildStatus::Queued, "status={status}");
        }
    }

    #[test]
    fn triggering_actor_wins_over_sender() {
        let payload = json!({
            "workflow_run": {
                "id": 2,
                "status": "queued",
                "triggering_actor": {"login": "alice"}
            },
            "sender": {"login": "bob"}
        });
        let event = normalize_github_actions(&payload).unwrap();
        assert_eq!(event.triggered_by.as_deref(), Some("alice"));
    }

    #[test]
    fn empty_object_is_malformed() {
        let err = normalize_github_actions(&json!({})).unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload { .. }));
    }

    #[test]
    fn missing_run_id_is_malformed() {
        let err = normalize_github_actions(&json!({"workflow_run": {"status": "queued"}}))
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedPayload { .. }));
    }
}
