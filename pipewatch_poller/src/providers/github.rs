//! GitHub Actions polling — recent workflow runs per repository.

use serde_json::json;

/// Fetch recent workflow runs for `owner/repo` and wrap each one in the
/// `{"workflow_run": ..., "repository": ...}` envelope the server's
/// normalizer consumes.
pub async fn fetch_recent_runs(
    client: &reqwest::Client,
    token: &str,
    repo: &str,
) -> eyre::Result<Vec<serde_json::Value>> {
    let url = format!("https://api.github.com/repos/{repo}/actions/runs?per_page=30");

    let mut request = client
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "pipewatch-poller");
    if !token.is_empty() {
        request = request.header("Authorization", format!("Bearer {token}"));
    }

    let resp = request.send().await?;
    if !resp.status().is_success() {
        return Err(eyre::eyre!(
            "GitHub API returned {} for {repo}",
            resp.status()
        ));
    }

    let body: serde_json::Value = resp.json().await?;
    let runs = body
        .get("workflow_runs")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(runs
        .into_iter()
        .map(|run| wrap_run(run, repo))
        .collect())
}

fn wrap_run(run: serde_json::Value, repo: &str) -> serde_json::Value {
    json!({
        "workflow_run": run,
        "repository": {"full_name": repo},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_run_in_webhook_envelope() {
        let run = json!({"id": 123, "status": "completed", "conclusion": "success"});
        let wrapped = wrap_run(run, "acme/api");

        assert_eq!(wrapped["workflow_run"]["id"], 123);
        assert_eq!(wrapped["repository"]["full_name"], "acme/api");
    }
}
