//! Notification channel implementations.

pub mod email;
pub mod slack;
pub mod webhook;

use async_trait::async_trait;

use crate::models::alert::{ChannelKind, Severity};
use crate::models::error::ChannelError;

/// A rendered notification, ready for any channel to deliver.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub severity: Severity,
}

/// Uniform contract for notification channels (email, Slack, webhook).
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Which channel this is, as recorded in `alert_records`.
    fn kind(&self) -> ChannelKind;

    /// Whether the channel has enough configuration to send.
    fn enabled(&self) -> bool;

    /// Deliver one message. Transport failures map to [`ChannelError`];
    /// the dispatcher decides what to do with them.
    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError>;
}
