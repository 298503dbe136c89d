//! REST API DTOs and query logic for builds, providers, and alerts.

use diesel_async::AsyncPgConnection;
use serde::{Deserialize, Serialize};

use crate::models::alert::{ChannelKind, Severity};
use crate::models::error::StoreError;
use crate::services::build_store::{self, BuildRow};

/// Response for the ingest endpoints.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn accepted(build_id: i64) -> Self {
        Self {
            accepted: true,
            build_id: Some(build_id),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            build_id: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListBuildsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BuildListResponse {
    pub items: Vec<BuildRow>,
    pub total: i64,
}

/// List builds with pagination and optional status/branch filters.
pub async fn list_builds(
    conn: &mut AsyncPgConnection,
    query: ListBuildsQuery,
) -> Result<BuildListResponse, StoreError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let (items, total) = build_store::list_builds(
        conn,
        limit,
        offset,
        query.status.as_deref(),
        query.branch.as_deref(),
    )
    .await?;

    Ok(BuildListResponse { items, total })
}

/// Request body for a configuration-verification alert.
#[derive(Debug, Deserialize)]
pub struct AlertTestRequest {
    pub channel: ChannelKind,
    pub message: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Info
}

#[derive(Debug, Serialize)]
pub struct AlertTestResponse {
    pub success: bool,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_test_request_parses_channel_and_severity() {
        let req: AlertTestRequest =
            serde_json::from_str(r#"{"channel":"slack","message":"hi","severity":"warning"}"#)
                .unwrap();
        assert_eq!(req.channel, ChannelKind::Slack);
        assert_eq!(req.severity, Severity::Warning);
    }

    #[test]
    fn alert_test_severity_defaults_to_info() {
        let req: AlertTestRequest =
            serde_json::from_str(r#"{"channel":"email","message":"hi"}"#).unwrap();
        assert_eq!(req.severity, Severity::Info);
    }

    #[test]
    fn ingest_response_omits_absent_fields() {
        let accepted = serde_json::to_value(IngestResponse::accepted(5)).unwrap();
        assert_eq!(accepted["accepted"], true);
        assert_eq!(accepted["build_id"], 5);
        assert!(accepted.get("error").is_none());

        let rejected = serde_json::to_value(IngestResponse::rejected("bad payload")).unwrap();
        assert_eq!(rejected["accepted"], false);
        assert!(rejected.get("build_id").is_none());
    }
}
