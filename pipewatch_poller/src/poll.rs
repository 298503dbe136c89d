//! Poll cycle orchestration — fetch per provider, push to the ingest API.

use std::time::Duration;

use crate::providers::{github, jenkins};
use crate::Cli;

pub struct Poller {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
    github_token: String,
    github_repos: Vec<String>,
    jenkins_url: String,
    jenkins_username: String,
    jenkins_token: String,
    jenkins_jobs: Vec<String>,
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Poller {
    pub fn new(cli: &Cli) -> eyre::Result<Self> {
        // One bounded client for both provider fetches and ingest posts;
        // the timeout keeps a slow provider from stalling the cycle.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cli.fetch_timeout))
            .build()?;

        Ok(Self {
            client,
            server_url: cli.server_url.trim_end_matches('/').to_string(),
            api_key: cli.api_key.clone(),
            github_token: cli.github_token.clone(),
            github_repos: split_csv(&cli.github_repos),
            jenkins_url: cli.jenkins_url.trim_end_matches('/').to_string(),
            jenkins_username: cli.jenkins_username.clone(),
            jenkins_token: cli.jenkins_token.clone(),
            jenkins_jobs: split_csv(&cli.jenkins_jobs),
        })
    }

    /// One full cycle over every configured provider. A failing provider
    /// is logged and skipped; it never aborts the rest of the cycle.
    pub async fn poll_cycle(&self) {
        tracing::info!("Starting poll cycle");
        let mut pushed = 0usize;
        let mut errors = 0usize;

        for repo in &self.github_repos {
            match github::fetch_recent_runs(&self.client, &self.github_token, repo).await {
                Ok(payloads) => {
                    pushed += self.push_all("github_actions", payloads).await;
                }
                Err(e) => {
                    errors += 1;
                    tracing::error!(repo = %repo, "GitHub fetch failed: {e}");
                }
            }
        }

        if !self.jenkins_url.is_empty() {
            for job in &self.jenkins_jobs {
                match jenkins::fetch_recent_builds(
                    &self.client,
                    &self.jenkins_url,
                    &self.jenkins_username,
                    &self.jenkins_token,
                    job,
                )
                .await
                {
                    Ok(payloads) => {
                        pushed += self.push_all("jenkins", payloads).await;
                    }
                    Err(e) => {
                        errors += 1;
                        tracing::error!(job = %job, "Jenkins fetch failed: {e}");
                    }
                }
            }
        }

        tracing::info!(pushed, errors, "Poll cycle completed");
    }

    /// POST each raw payload to the server's ingest endpoint.
    async fn push_all(&self, provider_kind: &str, payloads: Vec<serde_json::Value>) -> usize {
        let url = format!("{}/api/ingest/{}", self.server_url, provider_kind);
        let mut accepted = 0usize;

        for payload in payloads {
            let result = self
                .client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => accepted += 1,
                Ok(resp) => {
                    tracing::warn!(
                        provider = provider_kind,
                        status = %resp.status(),
                        "Ingest rejected payload"
                    );
                }
                Err(e) => {
                    tracing::error!(provider = provider_kind, "Ingest push failed: {e}");
                }
            }
        }

        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::split_csv;

    #[test]
    fn splits_and_trims_repo_lists() {
        assert_eq!(
            split_csv("acme/api, acme/web ,"),
            vec!["acme/api".to_string(), "acme/web".to_string()]
        );
        assert!(split_csv("").is_empty());
    }
}
