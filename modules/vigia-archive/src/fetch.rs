//! Publisher page fetching.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

/// How a fetch failed, for the download stage's state decisions: transient
/// failures leave the record where it is, permanent ones mark it failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("Failed to build page HTTP client");
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "Mozilla/5.0 (compatible; vigia/0.1)")
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            warn!(url, %status, "Permanent fetch failure");
            return Err(FetchError::Permanent(format!("HTTP {status}")));
        }
        if !status.is_success() {
            warn!(url, %status, "Transient fetch failure");
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        if body.trim().is_empty() {
            return Err(FetchError::Permanent("empty body".to_string()));
        }

        info!(url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}
