//! Ingest stage: feed entries in, pending sources out.

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use vigia_archive::FeedFetcher;
use vigia_common::{dates, terms, SourceStatus};
use vigia_store::{InsertSource, Store};

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub query: Option<String>,
    pub expand: bool,
    pub geo: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub fetched: u32,
    pub new_sources: u32,
    pub queued: u32,
}

impl std::fmt::Display for IngestReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched {} entries, {} new sources, {} queued for download",
            self.fetched, self.new_sources, self.queued
        )
    }
}

/// Run the ingest sweep. Returns the report plus the source ids that need
/// a download pass.
pub async fn run_ingest(
    store: &Store,
    fetcher: &FeedFetcher,
    base_query: &str,
    min_year: i32,
    opts: &IngestOptions,
) -> Result<(IngestReport, Vec<i64>)> {
    let base = opts.query.as_deref().unwrap_or(base_query);
    let queries = terms::build_queries(base, opts.expand, opts.geo);
    info!(queries = queries.len(), expand = opts.expand, geo = opts.geo, "Starting ingest");

    let entries = fetcher
        .fetch_grid(&queries, opts.start_date, opts.end_date)
        .await;

    let mut report = IngestReport {
        fetched: entries.len() as u32,
        ..Default::default()
    };
    let mut to_download = Vec::new();

    for entry in entries {
        let published_at = entry
            .published
            .map(|dt| dt.naive_utc())
            .and_then(|dt| dates::validate(dt, min_year));

        match store.find_source_by_url(&entry.url).await? {
            None => {
                let id = store
                    .insert_source(InsertSource {
                        url: entry.url,
                        title: entry.title,
                        source_type: "news_article".to_string(),
                        published_at,
                    })
                    .await?;
                report.new_sources += 1;
                to_download.push(id);
            }
            Some(existing) => {
                // A feed pull may supply the date a previous pull lacked.
                if existing.published_at.is_none() {
                    if let Some(date) = published_at {
                        store.set_source_published_at(existing.id, date).await?;
                    }
                }
                if opts.force || existing.status() == SourceStatus::Pending {
                    to_download.push(existing.id);
                }
                // Downloaded and not forced: nothing to do.
            }
        }
    }

    report.queued = to_download.len() as u32;
    info!(%report, "Ingest complete");
    Ok((report, to_download))
}
