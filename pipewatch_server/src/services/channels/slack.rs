//! Slack incoming-webhook channel.

use async_trait::async_trait;
use serde::Serialize;

use crate::models::alert::{ChannelKind, Severity};
use crate::models::error::ChannelError;

use super::{AlertChannel, AlertMessage};

pub struct SlackChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SlackPayload {
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    title: String,
    text: String,
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "#3498db",
        Severity::Warning => "#f39c12",
        Severity::Error | Severity::Critical => "#e74c3c",
    }
}

/// Format a message as a Slack webhook payload.
fn format_payload(message: &AlertMessage) -> SlackPayload {
    SlackPayload {
        attachments: vec![SlackAttachment {
            fallback: message.subject.clone(),
            color: severity_color(message.severity).to_string(),
            title: message.subject.clone(),
            text: message.body.clone(),
        }],
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or(ChannelError::NotConfigured("slack"))?;

        let resp = self
            .client
            .post(url)
            .json(&format_payload(message))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChannelError::BadStatus(resp.status().as_u16()));
        }

        tracing::info!(subject = %message.subject, "Slack alert sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_payload_is_red() {
        let message = AlertMessage {
            subject: "[CI/CD] Build failed: repo #12".into(),
            body: "Branch: main".into(),
            severity: Severity::Error,
        };
        let payload = format_payload(&message);
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].color, "#e74c3c");
        assert_eq!(payload.attachments[0].title, message.subject);
    }
}
