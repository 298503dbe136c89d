//! SMTP email channel.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::alert::ChannelKind;
use crate::models::error::ChannelError;

use super::{AlertChannel, AlertMessage};

pub struct EmailChannel {
    config: SmtpConfig,
}

impl EmailChannel {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn enabled(&self) -> bool {
        !self.config.host.is_empty() && !self.config.to.is_empty()
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        if !self.enabled() {
            return Err(ChannelError::NotConfigured("email"));
        }

        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| ChannelError::Smtp(format!("invalid from address: {e}")))?,
            )
            .to(self
                .config
                .to
                .parse()
                .map_err(|e| ChannelError::Smtp(format!("invalid to address: {e}")))?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| ChannelError::Smtp(format!("failed to build message: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
            .map_err(|e| ChannelError::Smtp(format!("transport setup failed: {e}")))?
            .port(self.config.port);

        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        let mailer = builder.build();
        mailer
            .send(email)
            .await
            .map_err(|e| ChannelError::Smtp(e.to_string()))?;

        tracing::info!(to = %self.config.to, subject = %message.subject, "Alert email sent");
        Ok(())
    }
}
