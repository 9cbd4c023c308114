//! Aggregator RSS feed fetching over a query × time-window grid.
//!
//! The upstream aggregator caps each query at ~100 results, so date-bounded
//! runs step one calendar day at a time. Deduplication across grid cells is
//! the ingest stage's job, not ours.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use tracing::{info, warn};

use vigia_common::FeedEntry;

const AGGREGATOR_RSS: &str = "https://news.google.com/rss/search";
const FEED_LOCALE: &[(&str, &str)] = &[("hl", "pt-BR"), ("gl", "BR"), ("ceid", "BR:pt-419")];

pub struct FeedFetcher {
    client: reqwest::Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to build RSS HTTP client");
        Self { client }
    }

    /// Fetch one grid cell: a single query string, dates already folded in.
    pub async fn fetch_query(&self, query: &str) -> Result<Vec<FeedEntry>> {
        let url = feed_url(query);
        info!(query, "Fetching feed");

        let resp = self
            .client
            .get(&url)
            .header("User-Agent", "vigia/0.1")
            .send()
            .await
            .context("Feed fetch failed")?;

        let bytes = resp.bytes().await.context("Failed to read feed body")?;
        let feed = feed_rs::parser::parse(&bytes[..]).context("Failed to parse RSS feed")?;

        let entries: Vec<FeedEntry> = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let url = entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
                let title = entry.title.map(|t| t.content).unwrap_or_default();
                let published = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&chrono::Utc));
                Some(FeedEntry {
                    url,
                    title,
                    published,
                })
            })
            .collect();

        info!(query, entries = entries.len(), "Feed parsed");
        Ok(entries)
    }

    /// Fetch the full expansion grid: every query from `queries`, windowed
    /// one day at a time over `[start, end)` when dates are given, or a
    /// single unbounded pull per query otherwise. Cell failures are logged
    /// and skipped; one dead cell never kills the run.
    pub async fn fetch_grid(
        &self,
        queries: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<FeedEntry> {
        let mut all = Vec::new();
        for query in queries {
            for cell in window_queries(query, start, end) {
                match self.fetch_query(&cell).await {
                    Ok(entries) => all.extend(entries),
                    Err(e) => {
                        warn!(query = %cell, error = %e, "Feed cell failed");
                    }
                }
            }
        }
        all
    }
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand one query into its date-windowed variants. Without a start date
/// the query is returned as-is. `end` defaults to today; windows step one
/// day from `start` inclusive to `end` exclusive.
pub fn window_queries(query: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<String> {
    let Some(start) = start else {
        return vec![query.to_string()];
    };
    let end = end.unwrap_or_else(|| chrono::Utc::now().date_naive());

    let mut cells = Vec::new();
    let mut current = start;
    while current < end {
        let mut next = current + ChronoDuration::days(1);
        if next > end {
            next = end;
        }
        cells.push(format!(
            "{query} after:{} before:{}",
            current.format("%Y-%m-%d"),
            next.format("%Y-%m-%d")
        ));
        current = next;
    }
    cells
}

/// Build the aggregator search URL for one query string.
pub fn feed_url(query: &str) -> String {
    let mut url = url::Url::parse(AGGREGATOR_RSS).expect("valid aggregator URL");
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("q", query);
        for (k, v) in FEED_LOCALE {
            pairs.append_pair(k, v);
        }
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn no_dates_yields_single_unbounded_cell() {
        assert_eq!(window_queries("Rio de Janeiro", None, None), vec!["Rio de Janeiro"]);
    }

    #[test]
    fn windows_step_one_day_end_exclusive() {
        let cells = window_queries(
            "Rio de Janeiro",
            Some(date(2024, 5, 10)),
            Some(date(2024, 5, 13)),
        );
        assert_eq!(
            cells,
            vec![
                "Rio de Janeiro after:2024-05-10 before:2024-05-11",
                "Rio de Janeiro after:2024-05-11 before:2024-05-12",
                "Rio de Janeiro after:2024-05-12 before:2024-05-13",
            ]
        );
    }

    #[test]
    fn empty_range_yields_no_cells() {
        let cells = window_queries(
            "Rio de Janeiro",
            Some(date(2024, 5, 13)),
            Some(date(2024, 5, 13)),
        );
        assert!(cells.is_empty());
    }

    #[test]
    fn feed_url_encodes_query_and_locale() {
        let url = feed_url("Rio de Janeiro \"tiroteio\" after:2024-05-10");
        assert!(url.starts_with("https://news.google.com/rss/search?q="));
        assert!(url.contains("Rio+de+Janeiro"));
        assert!(url.contains("after%3A2024-05-10"));
        assert!(url.contains("hl=pt-BR"));
        assert!(url.contains("gl=BR"));
        assert!(url.contains("ceid=BR%3Apt-419"));
    }
}
