//! Jenkins polling — recent builds per job via the JSON API.

use serde_json::json;

/// Fetch recent builds for a Jenkins job and wrap each one in the
/// `{"name": ..., "build": ...}` envelope the server's normalizer consumes.
pub async fn fetch_recent_builds(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    token: &str,
    job: &str,
) -> eyre::Result<Vec<serde_json::Value>> {
    let url = format!(
        "{base_url}/job/{job}/api/json?tree=builds[number,result,timestamp,duration,url]{{0,30}}"
    );

    let mut request = client.get(&url);
    if !username.is_empty() {
        request = request.basic_auth(username, Some(token));
    }

    let resp = request.send().await?;
    if !resp.status().is_success() {
        return Err(eyre::eyre!("Jenkins API returned {} for {job}", resp.status()));
    }

    let body: serde_json::Value = resp.json().await?;
    let builds = body
        .get("builds")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Ok(builds
        .into_iter()
        .map(|build| wrap_build(build, job))
        .collect())
}

fn wrap_build(build: serde_json::Value, job: &str) -> serde_json::Value {
    json!({
        "name": job,
        "build": build,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_build_in_notification_envelope() {
        let build = json!({"number": 42, "result": "SUCCESS", "timestamp": 1705312800000i64});
        let wrapped = wrap_build(build, "deploy-api");

        assert_eq!(wrapped["name"], "deploy-api");
        assert_eq!(wrapped["build"]["number"], 42);
    }
}
