//! Error taxonomy for the ingestion and alerting core.
//!
//! Ingestion errors propagate to the event source so it can retry;
//! channel errors are recorded in `alert_records` and never escape the
//! dispatcher.

use thiserror::Error;

/// Persistence-layer failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

/// Failures on the ingestion path (webhook handler or poller feed).
#[derive(Debug, Error)]
pub enum IngestError {
    /// Raw payload is missing required provider-specific keys.
    #[error("malformed {provider} payload: {detail}")]
    MalformedPayload {
        provider: &'static str,
        detail: String,
    },

    #[error("unknown provider kind: {0}")]
    UnknownProvider(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures when delivering a notification through one channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("channel not configured: {0}")]
    NotConfigured(&'static str),

    #[error("send timed out after {0}s")]
    Timeout(u64),

    #[error("unexpected response status: {0}")]
    BadStatus(u16),
}
