//! Generic outbound-webhook channel — POSTs the rendered alert as JSON to
//! a configured URL.

use async_trait::async_trait;

use crate::models::alert::ChannelKind;
use crate::models::error::ChannelError;

use super::{AlertChannel, AlertMessage};

pub struct WebhookChannel {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn enabled(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let url = self
            .url
            .as_deref()
            .ok_or(ChannelError::NotConfigured("webhook"))?;

        let body = serde_json::json!({
            "subject": message.subject,
            "body": message.body,
            "severity": message.severity.as_str(),
        });

        let resp = self.client.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(ChannelError::BadStatus(resp.status().as_u16()));
        }

        Ok(())
    }
}
