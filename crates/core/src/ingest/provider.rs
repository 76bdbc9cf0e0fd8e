use crate::ingest::types::{GroupResult, SourceError};
use anyhow::Context;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; morningbrief/0.1)";

/// One upstream source, normalized into its group's canonical shape.
///
/// Implementations convert every fault into a [`SourceError`]; nothing escapes the boundary.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    type Output: Send;

    fn source_name(&self) -> &str;

    async fn fetch(&self) -> GroupResult<Self::Output>;
}

pub fn build_http(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build source http client")
}

pub async fn fetch_json(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> GroupResult<Value> {
    let text = fetch_text(http, url, query).await?;
    serde_json::from_str::<Value>(&text).map_err(|err| {
        SourceError::malformed(format!("response is not valid JSON ({err}): {}", preview(&text)))
    })
}

pub async fn fetch_bytes(http: &reqwest::Client, url: &str) -> GroupResult<Vec<u8>> {
    let res = send(http, url, &[]).await?;
    let bytes = res
        .bytes()
        .await
        .map_err(|err| SourceError::unavailable(format!("failed to read response body: {err}")))?;
    Ok(bytes.to_vec())
}

async fn fetch_text(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> GroupResult<String> {
    let res = send(http, url, query).await?;
    res.text()
        .await
        .map_err(|err| SourceError::unavailable(format!("failed to read response body: {err}")))
}

async fn send(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> GroupResult<reqwest::Response> {
    let res = http.get(url).query(query).send().await.map_err(|err| {
        if err.is_timeout() {
            SourceError::unavailable(format!("request timed out: {url}"))
        } else {
            SourceError::unavailable(format!("request failed: {err}"))
        }
    })?;

    let status = res.status();
    if !status.is_success() {
        return Err(SourceError::unavailable(format!("HTTP {status} from {url}")));
    }
    Ok(res)
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}
