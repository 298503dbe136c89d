//! Provider payload normalization — pure functions, no side effects.
//!
//! Each provider module reduces its raw JSON shape (webhook body or polled
//! API response) to the canonical [`BuildEvent`]. Required keys missing
//! from the payload surface as [`IngestError::MalformedPayload`]; optional
//! fields degrade to `None` rather than failing the whole event.

pub mod github;
pub mod jenkins;

use crate::models::error::IngestError;
use crate::models::event::{BuildEvent, ProviderKind};

/// Normalize a raw payload according to the provider kind.
pub fn normalize(kind: ProviderKind, payload: &serde_json::Value) -> Result<BuildEvent, IngestError> {
    match kind {
        ProviderKind::GithubActions => github::normalize_github_actions(payload),
        ProviderKind::Jenkins => jenkins::normalize_jenkins(payload),
    }
}

/// Parse an ISO-8601 timestamp, tolerating absence or junk.
pub(crate) fn parse_rfc3339(value: &serde_json::Value) -> Option<chrono::DateTime<chrono::Utc>> {
    value
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
