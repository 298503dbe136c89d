//! Pipewatch Poller — background worker for providers without webhook push.
//!
//! Periodically fetches recent runs from GitHub Actions and Jenkins and
//! feeds them to the server's ingest API, where they travel the same
//! normalize/upsert path as webhook deliveries.

mod poll;
mod providers;

use std::time::Duration;

use clap::Parser;
use rand::Rng;

#[derive(Parser, Clone)]
#[command(name = "pipewatch-poller", about = "Pipewatch CI provider poller")]
struct Cli {
    /// Pipewatch server base URL
    #[arg(long, env = "PW_SERVER_URL", default_value = "http://localhost:8000")]
    server_url: String,

    /// Write key for the ingest API
    #[arg(long, env = "PW_API_KEY", default_value = "")]
    api_key: String,

    /// Polling interval in seconds
    #[arg(long, env = "PW_POLL_INTERVAL", default_value = "60")]
    interval: u64,

    /// Maximum random jitter added to each interval, in seconds
    #[arg(long, env = "PW_POLL_JITTER", default_value = "10")]
    jitter: u64,

    /// Per-provider fetch timeout in seconds
    #[arg(long, env = "PW_FETCH_TIMEOUT", default_value = "10")]
    fetch_timeout: u64,

    /// GitHub personal access token
    #[arg(long, env = "GITHUB_TOKEN", default_value = "")]
    github_token: String,

    /// Comma-separated owner/repo pairs to poll
    #[arg(long, env = "GITHUB_REPOS", default_value = "")]
    github_repos: String,

    /// Jenkins base URL
    #[arg(long, env = "JENKINS_URL", default_value = "")]
    jenkins_url: String,

    /// Jenkins username
    #[arg(long, env = "JENKINS_USERNAME", default_value = "")]
    jenkins_username: String,

    /// Jenkins API token
    #[arg(long, env = "JENKINS_API_TOKEN", default_value = "")]
    jenkins_token: String,

    /// Comma-separated Jenkins job names to poll
    #[arg(long, env = "JENKINS_JOBS", default_value = "")]
    jenkins_jobs: String,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let poller = poll::Poller::new(&cli)?;

    if cli.once {
        poller.poll_cycle().await;
        return Ok(());
    }

    tracing::info!(
        interval = cli.interval,
        jitter = cli.jitter,
        "Starting Pipewatch poller"
    );

    loop {
        poller.poll_cycle().await;

        // Jitter the sleep so horizontally-scaled pollers do not hit the
        // providers in lockstep.
        let jitter = if cli.jitter > 0 {
            rand::thread_rng().gen_range(0..=cli.jitter)
        } else {
            0
        };
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.interval + jitter)) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down...");
                break;
            }
        }
    }

    Ok(())
}
