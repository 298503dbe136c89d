//! Dashboard configuration — loaded once from environment variables at
//! startup and passed by reference into the services that need it.

/// SMTP settings for the email alert channel.
#[derive(Clone, Debug, Default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug)]
pub struct DashConfig {
    /// Write key required on ingest endpoints (poller, non-GitHub webhooks).
    pub api_key: String,
    /// GitHub webhook secret for HMAC validation.
    pub github_webhook_secret: String,
    /// Also notify when a build transitions into success.
    pub alert_on_success: bool,
    /// Per-channel send timeout in seconds.
    pub alert_send_timeout_secs: u64,
    /// SMTP settings for the email channel.
    pub smtp: SmtpConfig,
    /// Slack incoming-webhook URL.
    pub slack_webhook_url: Option<String>,
    /// Generic outbound-webhook URL.
    pub alert_webhook_url: Option<String>,
    /// Default metrics window in days.
    pub default_window_days: i32,
}

impl DashConfig {
    pub fn from_env() -> Self {
        let api_key = std::env::var("PW_API_KEY").unwrap_or_default();
        let github_webhook_secret = std::env::var("PW_WEBHOOK_SECRET").unwrap_or_default();
        let alert_on_success = std::env::var("PW_ALERT_ON_SUCCESS")
            .map(|s| s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let alert_send_timeout_secs = std::env::var("PW_ALERT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let default_window_days = std::env::var("PW_METRICS_WINDOW_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);

        let smtp = SmtpConfig {
            host: std::env::var("PW_SMTP_HOST").unwrap_or_default(),
            port: std::env::var("PW_SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            username: std::env::var("PW_SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("PW_SMTP_PASSWORD").unwrap_or_default(),
            from: std::env::var("PW_SMTP_FROM").unwrap_or_default(),
            to: std::env::var("PW_ALERT_EMAIL_TO").unwrap_or_default(),
        };

        let slack_webhook_url = std::env::var("PW_SLACK_WEBHOOK_URL").ok().filter(|s| !s.is_empty());
        let alert_webhook_url = std::env::var("PW_ALERT_WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        if api_key.is_empty() {
            tracing::warn!("PW_API_KEY not set -- ingest API key check disabled");
        }
        if github_webhook_secret.is_empty() {
            tracing::warn!("PW_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if smtp.host.is_empty() && slack_webhook_url.is_none() && alert_webhook_url.is_none() {
            tracing::warn!("No alert channel configured -- failures will only be logged");
        }

        Self {
            api_key,
            github_webhook_secret,
            alert_on_success,
            alert_send_timeout_secs,
            smtp,
            slack_webhook_url,
            alert_webhook_url,
            default_window_days,
        }
    }
}
