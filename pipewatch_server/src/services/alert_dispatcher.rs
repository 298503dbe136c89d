//! Alert evaluation, deduplication, and fan-out.
//!
//! The dispatcher is driven by the transition signals the build store
//! reports. It never propagates a failure to the ingestion caller: every
//! send attempt ends as an `alert_records` row, successful or not, and the
//! partial unique index on `(build_id, channel) WHERE success` guarantees
//! at most one successful send per build and channel even under concurrent
//! dispatch.

use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::config::DashConfig;
use crate::models::alert::{AlertRecord, ChannelKind, NewAlertRecord, Severity};
use crate::models::build::Build;
use crate::models::error::{ChannelError, StoreError};
use crate::schema::alert_records;
use crate::services::build_store::UpsertOutcome;
use crate::services::channels::email::EmailChannel;
use crate::services::channels::slack::SlackChannel;
use crate::services::channels::webhook::WebhookChannel;
use crate::services::channels::{AlertChannel, AlertMessage};

pub struct AlertDispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
    send_timeout_secs: u64,
    notify_on_success: bool,
}

/// Render the notification for a stored build.
pub fn render_message(build: &Build, provider_name: &str, severity: Severity) -> AlertMessage {
    let subject = format!(
        "[CI/CD] Build {}: {} #{}",
        build.status, provider_name, build.external_id
    );

    let mut body = String::new();
    if let Some(branch) = &build.branch {
        body.push_str(&format!("Branch: {branch}\n"));
    }
    if let Some(sha) = &build.commit_sha {
        body.push_str(&format!("Commit: {sha}\n"));
    }
    if let Some(duration) = build.duration_seconds {
        body.push_str(&format!("Duration: {duration}s\n"));
    }
    if let Some(url) = &build.url {
        body.push_str(&format!("URL: {url}\n"));
    }

    AlertMessage {
        subject,
        body,
        severity,
    }
}

impl AlertDispatcher {
    /// Build the channel set from configuration. Channels without enough
    /// configuration stay registered but disabled, so a test send can
    /// report a clear "not configured" error.
    pub fn new(config: &DashConfig) -> Self {
        let channels: Vec<Box<dyn AlertChannel>> = vec![
            Box::new(EmailChannel::new(config.smtp.clone())),
            Box::new(SlackChannel::new(config.slack_webhook_url.clone())),
            Box::new(WebhookChannel::new(config.alert_webhook_url.clone())),
        ];

        Self {
            channels,
            send_timeout_secs: config.alert_send_timeout_secs,
            notify_on_success: config.alert_on_success,
        }
    }

    /// Evaluate an upsert outcome and fan out to every enabled channel.
    ///
    /// Channel and storage failures are logged and recorded; they never
    /// bubble up into the ingestion path that triggered them.
    pub async fn evaluate(
        &self,
        conn: &mut AsyncPgConnection,
        outcome: &UpsertOutcome,
        provider_name: &str,
    ) {
        let severity = if outcome.newly_failed {
            Severity::Error
        } else if outcome.newly_succeeded && self.notify_on_success {
            Severity::Info
        } else {
            return;
        };

        let message = render_message(&outcome.build, provider_name, severity);

        for channel in &self.channels {
            if !channel.enabled() {
                continue;
            }
            if let Err(e) = self
                .dispatch_one(conn, channel.as_ref(), &outcome.build, &message)
                .await
            {
                tracing::error!(
                    build_id = outcome.build.id,
                    channel = channel.kind().as_str(),
                    "Failed to record alert attempt: {e}"
                );
            }
        }
    }

    /// Send through one channel with debounce and audit recording.
    async fn dispatch_one(
        &self,
        conn: &mut AsyncPgConnection,
        channel: &dyn AlertChannel,
        build: &Build,
        message: &AlertMessage,
    ) -> Result<(), StoreError> {
        let kind = channel.kind();

        let already_sent: i64 = alert_records::table
            .filter(alert_records::build_id.eq(build.id))
            .filter(alert_records::channel.eq(kind.as_str()))
            .filter(alert_records::success.eq(true))
            .count()
            .get_result(conn)
            .await?;

        if already_sent > 0 {
            tracing::debug!(
                build_id = build.id,
                channel = kind.as_str(),
                "Alert already sent, skipping"
            );
            return Ok(());
        }

        let result = self.send_bounded(channel, message).await;
        let (success, error_detail) = match &result {
            Ok(()) => (true, None),
            Err(e) => {
                tracing::warn!(
                    build_id = build.id,
                    channel = kind.as_str(),
                    "Alert send failed: {e}"
                );
                (false, Some(e.to_string()))
            }
        };
        crate::metrics::alert_dispatched(kind.as_str(), success);

        let record = NewAlertRecord {
            build_id: build.id,
            channel: kind.as_str().to_string(),
            success,
            error_detail,
            message: format!("{}\n{}", message.subject, message.body),
            sent_at: Utc::now(),
        };

        // The partial unique index absorbs the race where two dispatchers
        // sent concurrently; the second successful record is dropped.
        diesel::insert_into(alert_records::table)
            .values(&record)
            .on_conflict((alert_records::build_id, alert_records::channel))
            .filter_target(alert_records::success.eq(true))
            .do_nothing()
            .execute(conn)
            .await?;

        Ok(())
    }

    /// One send attempt, bounded by the configured timeout.
    async fn send_bounded(
        &self,
        channel: &dyn AlertChannel,
        message: &AlertMessage,
    ) -> Result<(), ChannelError> {
        match tokio::time::timeout(
            Duration::from_secs(self.send_timeout_secs),
            channel.send(message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout(self.send_timeout_secs)),
        }
    }

    /// Configuration-verification send: bypasses debounce, writes no
    /// audit record, and surfaces the channel error to the caller.
    pub async fn send_test(
        &self,
        kind: ChannelKind,
        text: &str,
        severity: Severity,
    ) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.kind() == kind)
            .ok_or(ChannelError::NotConfigured("unknown channel"))?;

        let message = AlertMessage {
            subject: format!("[CI/CD] Test alert ({})", severity.as_str()),
            body: text.to_string(),
            severity,
        };

        self.send_bounded(channel.as_ref(), &message).await
    }
}

/// Recent alert dispatch attempts, newest first — the audit trail behind
/// the deduplication guarantee.
pub async fn list_recent_alerts(
    conn: &mut AsyncPgConnection,
    limit: i64,
) -> Result<Vec<AlertRecord>, StoreError> {
    let rows = alert_records::table
        .order(alert_records::sent_at.desc())
        .limit(limit)
        .load::<AlertRecord>(conn)
        .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> Build {
        Build {
            id: 7,
            provider_id: 1,
            external_id: "123".into(),
            status: "failed".into(),
            branch: Some("main".into()),
            commit_sha: Some("abc123".into()),
            triggered_by: Some("john".into()),
            url: Some("https://github.com/acme/api/actions/runs/123".into()),
            started_at: None,
            finished_at: None,
            duration_seconds: Some(180),
            raw_payload: None,
            create_date: None,
            write_date: None,
        }
    }

    #[test]
    fn renders_subject_from_template() {
        let message = render_message(&build(), "acme/api", Severity::Error);
        assert_eq!(message.subject, "[CI/CD] Build failed: acme/api #123");
    }

    #[test]
    fn body_includes_branch_duration_and_url() {
        let message = render_message(&build(), "acme/api", Severity::Error);
        assert!(message.body.contains("Branch: main"));
        assert!(message.body.contains("Duration: 180s"));
        assert!(message.body.contains("URL: https://github.com/acme/api/actions/runs/123"));
    }

    #[test]
    fn body_omits_absent_fields() {
        let mut b = build();
        b.branch = None;
        b.url = None;
        let message = render_message(&b, "acme/api", Severity::Error);
        assert!(!message.body.contains("Branch:"));
        assert!(!message.body.contains("URL:"));
    }

    #[test]
    fn subject_reflects_success_status() {
        let mut b = build();
        b.status = "success".into();
        let message = render_message(&b, "acme/api", Severity::Info);
        assert_eq!(message.subject, "[CI/CD] Build success: acme/api #123");
    }
}
