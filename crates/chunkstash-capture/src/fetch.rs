use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use crate::error::{CaptureError, CaptureResult};

/// Source of captured artifacts.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the current artifact behind `url`.
    async fn fetch(&self, url: &str) -> CaptureResult<Bytes>;
}

/// HTTP [`Fetcher`] that defeats intermediate caches with a `ts` query
/// parameter.
pub struct HttpFetcher {
    client: reqwest::Client,
}

/// Request timeout used by the CLI.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> CaptureResult<Self> {
        if timeout_secs == 0 {
            return Err(CaptureError::InvalidConfig(
                "fetch timeout must be positive".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CaptureError::InvalidConfig(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CaptureResult<Bytes> {
        let fail = |reason: String| CaptureError::Fetch {
            url: url.to_string(),
            reason,
        };

        let cache_buster = Utc::now().timestamp_millis().to_string();
        let response = self
            .client
            .get(url)
            .query(&[("ts", cache_buster.as_str())])
            .send()
            .await
            .map_err(|e| fail(format!("connection error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fail(format!("read error: {e}")))?;
        if body.is_empty() {
            return Err(fail("empty body".to_string()));
        }

        debug!(url, size = body.len(), "fetched artifact");
        Ok(body)
    }
}
