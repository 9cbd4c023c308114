//! Aggregator URL resolution.
//!
//! Aggregator links are redirect wrappers around the publisher URL. The
//! decoder is opaque and rate-limited; resolution is best-effort and must
//! never abort a pipeline run: any failure hands back the input URL.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

const AGGREGATOR_HOST: &str = "news.google.com";
const PACING_INTERVAL: Duration = Duration::from_secs(1);

/// Opaque aggregator URL decoder. `Ok(None)` means the decoder answered
/// but declined (negative status); `Err` means it broke.
#[async_trait]
pub trait UrlDecoder: Send + Sync {
    async fn decode(&self, url: &str) -> Result<Option<String>>;
}

/// Decoder that follows the aggregator's HTTP redirect chain and reports
/// the final URL.
pub struct RedirectDecoder {
    client: reqwest::Client,
}

impl RedirectDecoder {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("Failed to build resolver HTTP client");
        Self { client }
    }
}

impl Default for RedirectDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlDecoder for RedirectDecoder {
    async fn decode(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", "vigia/0.1")
            .send()
            .await
            .context("Decoder request failed")?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        let final_url = resp.url().to_string();
        if final_url == url {
            return Ok(None);
        }
        Ok(Some(final_url))
    }
}

/// Best-effort resolver with ≥1 s pacing between decoder calls.
pub struct UrlResolver {
    decoder: Box<dyn UrlDecoder>,
    last_call: Mutex<Option<Instant>>,
}

impl UrlResolver {
    pub fn new(decoder: Box<dyn UrlDecoder>) -> Self {
        Self {
            decoder,
            last_call: Mutex::new(None),
        }
    }

    /// Resolve an aggregator URL to the publisher URL. Non-aggregator hosts
    /// pass through untouched. Every failure path returns the input.
    pub async fn resolve(&self, url: &str) -> String {
        if !is_aggregator_url(url) {
            return url.to_string();
        }

        self.pace().await;

        match self.decoder.decode(url).await {
            Ok(Some(resolved)) => {
                debug!(url, resolved, "Resolved aggregator URL");
                resolved
            }
            Ok(None) => {
                debug!(url, "Decoder declined, keeping original URL");
                url.to_string()
            }
            Err(e) => {
                warn!(url, error = %e, "Error resolving URL");
                url.to_string()
            }
        }
    }

    /// Hold the decoder to at most one call per pacing interval.
    async fn pace(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < PACING_INTERVAL {
                tokio::time::sleep(PACING_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Whether the URL's host is the aggregator.
pub fn is_aggregator_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == AGGREGATOR_HOST))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedDecoder(Option<String>);

    #[async_trait]
    impl UrlDecoder for FixedDecoder {
        async fn decode(&self, _url: &str) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    struct FailingDecoder;

    #[async_trait]
    impl UrlDecoder for FailingDecoder {
        async fn decode(&self, _url: &str) -> Result<Option<String>> {
            anyhow::bail!("decoder exploded")
        }
    }

    struct CountingDecoder(AtomicU32);

    #[async_trait]
    impl UrlDecoder for CountingDecoder {
        async fn decode(&self, _url: &str) -> Result<Option<String>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Some("https://pub/x".to_string()))
        }
    }

    #[test]
    fn recognizes_aggregator_host() {
        assert!(is_aggregator_url("https://news.google.com/rss/articles/abc"));
        assert!(!is_aggregator_url("https://g1.globo.com/rio"));
        assert!(!is_aggregator_url("not a url"));
    }

    #[tokio::test]
    async fn non_aggregator_passes_through_without_decoding() {
        let resolver = UrlResolver::new(Box::new(FailingDecoder));
        let url = "https://g1.globo.com/rio/materia";
        assert_eq!(resolver.resolve(url).await, url);
    }

    #[tokio::test]
    async fn decoder_success_returns_resolved() {
        let resolver = UrlResolver::new(Box::new(FixedDecoder(Some("https://pub/x".into()))));
        let resolved = resolver.resolve("https://news.google.com/rss/articles/abc").await;
        assert_eq!(resolved, "https://pub/x");
    }

    #[tokio::test]
    async fn decoder_decline_returns_original() {
        let resolver = UrlResolver::new(Box::new(FixedDecoder(None)));
        let url = "https://news.google.com/rss/articles/abc";
        assert_eq!(resolver.resolve(url).await, url);
    }

    #[tokio::test]
    async fn decoder_error_returns_original() {
        let resolver = UrlResolver::new(Box::new(FailingDecoder));
        let url = "https://news.google.com/rss/articles/abc";
        assert_eq!(resolver.resolve(url).await, url);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_calls_are_paced() {
        let resolver = UrlResolver::new(Box::new(CountingDecoder(AtomicU32::new(0))));
        let start = Instant::now();
        resolver.resolve("https://news.google.com/rss/articles/a").await;
        resolver.resolve("https://news.google.com/rss/articles/b").await;
        assert!(start.elapsed() >= PACING_INTERVAL);
    }
}
