// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::SnapshotError;

/// Where snapshot bytes come from. The production implementation is
/// [`HttpSource`]; tests swap in [`FakeSource`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the artifact at `url` into `dest`, streaming; the full
    /// payload is never held in memory.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), SnapshotError>;
}

pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SnapshotError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SnapshotError::Network {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SnapshotError::FetchFailed {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    async fn stream_to(resp: reqwest::Response, url: &str, dest: &Path) -> Result<(), SnapshotError> {
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SnapshotError::Network {
                url: url.to_string(),
                detail: format!("body stream aborted: {e}"),
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), SnapshotError> {
        let resp = self.get(url).await?;
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/html"));
        if !is_html {
            return Self::stream_to(resp, url, dest).await;
        }

        // The provider answered with a click-through page instead of the
        // payload. Resolve the embedded confirm token and re-issue.
        let body = resp.text().await.map_err(|e| SnapshotError::Network {
            url: url.to_string(),
            detail: format!("interstitial read failed: {e}"),
        })?;
        let token = parse_confirm_token(&body).ok_or_else(|| SnapshotError::Network {
            url: url.to_string(),
            detail: "interstitial page carried no confirm token".to_string(),
        })?;
        let confirm_url = append_confirm(url, &token)?;
        info!(url, "resolving download interstitial with confirm token");
        let resp = self.get(&confirm_url).await?;
        Self::stream_to(resp, &confirm_url, dest).await
    }
}

fn append_confirm(url: &str, token: &str) -> Result<String, SnapshotError> {
    let mut parsed = reqwest::Url::parse(url).map_err(|e| SnapshotError::Network {
        url: url.to_string(),
        detail: format!("invalid source url: {e}"),
    })?;
    parsed.query_pairs_mut().append_pair("confirm", token);
    Ok(parsed.into())
}

/// Pulls the confirmation token out of an interstitial page. Two shapes
/// occur in the wild: a `confirm=<token>` query pair inside the
/// continuation link, and a hidden `<input name="confirm" value=...>`
/// form field.
#[must_use]
pub fn parse_confirm_token(body: &str) -> Option<String> {
    if let Some(pos) = body.find("confirm=") {
        let tail = &body[pos + "confirm=".len()..];
        let token: String = tail
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if !token.is_empty() {
            return Some(token);
        }
    }
    let tail = &body[body.find("name=\"confirm\"")?..];
    let rest = &tail[tail.find("value=\"")? + "value=\"".len()..];
    let token = &rest[..rest.find('"')?];
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// In-memory source for tests: hands out a fixed payload and counts how
/// often it was asked, so provisioning tests can assert idempotence and
/// the one-retry self-heal bound.
pub struct FakeSource {
    pub payload: tokio::sync::Mutex<Vec<u8>>,
    pub fetch_calls: AtomicU64,
}

impl FakeSource {
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload: tokio::sync::Mutex::new(payload),
            fetch_calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn fetch_to(&self, _url: &str, dest: &Path) -> Result<(), SnapshotError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        let payload = self.payload.lock().await.clone();
        tokio::fs::write(dest, payload).await?;
        Ok(())
    }
}
