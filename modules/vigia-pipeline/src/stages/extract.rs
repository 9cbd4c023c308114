//! Extract stage: keyword gate, then LLM extraction, then the 1:1
//! extraction upsert.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use tracing::{error, info};

use vigia_common::{dates, keywords, SourceStatus};
use vigia_store::{InsertEvent, Store};

use crate::extractor::EventClassifier;
use crate::stages::download::{download_one, DownloadDeps};

pub struct ExtractDeps {
    pub store: Store,
    pub classifier: Arc<dyn EventClassifier>,
    pub download: Arc<DownloadDeps>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// An extraction row was created for this source.
    Created { event_id: i64 },
    /// The existing extraction row was updated in place (force).
    Updated { event_id: i64 },
    /// Gated out (no keywords, invalid per the LLM, or no content).
    Skipped,
    /// The record errored; state unchanged.
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractReport {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl std::fmt::Display for ExtractReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} skipped, {} failed",
            self.created, self.updated, self.skipped, self.failed
        )
    }
}

/// Extract one source. Ensures content first (running the download
/// sub-steps when it is missing or `force`), then gates through the
/// keyword filter and the LLM.
pub async fn extract_one(
    deps: &ExtractDeps,
    source_id: i64,
    force: bool,
) -> Result<ExtractOutcome> {
    let Some(source) = deps.store.get_source(source_id).await? else {
        return Ok(ExtractOutcome::Skipped);
    };

    if source.status() == SourceStatus::Processed && !force {
        return Ok(ExtractOutcome::Skipped);
    }

    // 1. Ensure content.
    if source.content.is_none() || force {
        download_one(&deps.download, source_id, force).await?;
    }
    let Some(source) = deps.store.get_source(source_id).await? else {
        return Ok(ExtractOutcome::Skipped);
    };
    let Some(content) = source.content.clone().filter(|c| !c.trim().is_empty()) else {
        return Ok(ExtractOutcome::Skipped);
    };

    // 2. Fast keyword gate.
    let matches = keywords::matches(&content);
    if matches.is_empty() {
        deps.store
            .set_source_status(source_id, SourceStatus::Processed, force)
            .await?;
        return Ok(ExtractOutcome::Skipped);
    }

    // 3. LLM extraction, anchored on the best known publication date.
    // fetched_at is context of last resort, never a publication date.
    let pub_date = match source.published_at {
        Some(date) => Some(date),
        None => {
            dates::warn_fetched_at_context(source_id);
            Some(source.fetched_at)
        }
    };
    let event = deps.classifier.classify(&content, &matches, pub_date).await;

    if !event.is_valid {
        info!(source_id, title = %source.title, "LLM rejected source");
        deps.store
            .set_source_status(source_id, SourceStatus::Processed, force)
            .await?;
        return Ok(ExtractOutcome::Skipped);
    }

    // 4. Upsert the extraction. The source_id uniqueness keeps this 1:1;
    // under force the same row is updated in place.
    let existing = deps.store.find_event_by_source(source_id).await?;
    let event_id = deps
        .store
        .upsert_event(InsertEvent {
            source_id,
            summary: event
                .summary
                .clone()
                .unwrap_or_else(|| "Sem resumo".to_string()),
            extracted_victim_name: event.victim_name.clone(),
            extracted_location: event.location.clone(),
            extracted_date: event.date.as_deref().and_then(parse_event_date),
            confidence_score: event.clamped_confidence(),
        })
        .await?;

    deps.store
        .set_source_status(source_id, SourceStatus::Processed, force)
        .await?;

    info!(
        source_id,
        event_id,
        victim = event.victim_name.as_deref().unwrap_or("-"),
        "Extraction stored"
    );

    Ok(if existing.is_some() {
        ExtractOutcome::Updated { event_id }
    } else {
        ExtractOutcome::Created { event_id }
    })
}

/// Strict event-date parse: the LLM is instructed to answer YYYY-MM-DD;
/// anything else leaves the field null.
fn parse_event_date(raw: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Run the bounded extraction pool over a batch of source ids.
pub async fn run_extract(
    deps: Arc<ExtractDeps>,
    source_ids: Vec<i64>,
    force: bool,
    workers: usize,
    shutdown: Arc<AtomicBool>,
) -> Result<(ExtractReport, Vec<i64>)> {
    let total = source_ids.len();
    if total == 0 {
        info!("No sources to extract");
        return Ok((ExtractReport::default(), Vec::new()));
    }

    info!(total, workers, force, "Starting extraction");
    let done = Arc::new(AtomicU32::new(0));

    let outcomes: Vec<ExtractOutcome> = stream::iter(source_ids.into_iter().map(|source_id| {
        let deps = Arc::clone(&deps);
        let shutdown = Arc::clone(&shutdown);
        let done = Arc::clone(&done);
        async move {
            if shutdown.load(Ordering::SeqCst) {
                return ExtractOutcome::Skipped;
            }
            let outcome = match extract_one(&deps, source_id, force).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(source_id, error = %e, "Extraction worker error");
                    ExtractOutcome::Failed
                }
            };
            let count = done.fetch_add(1, Ordering::SeqCst) + 1;
            if count % 10 == 0 || count as usize == total {
                info!("Extraction progress: {count}/{total}");
            }
            outcome
        }
    }))
    .buffer_unordered(workers.max(1))
    .collect()
    .await;

    let mut report = ExtractReport::default();
    let mut event_ids = Vec::new();
    for outcome in outcomes {
        match outcome {
            ExtractOutcome::Created { event_id } => {
                report.created += 1;
                event_ids.push(event_id);
            }
            ExtractOutcome::Updated { event_id } => {
                report.updated += 1;
                event_ids.push(event_id);
            }
            ExtractOutcome::Skipped => report.skipped += 1,
            ExtractOutcome::Failed => report.failed += 1,
        }
    }

    info!(%report, "Extraction complete");
    Ok((report, event_ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_event_date() {
        let parsed = parse_event_date("2024-05-09").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-05-09");
    }

    #[test]
    fn rejects_non_iso_event_date() {
        assert!(parse_event_date("09/05/2024").is_none());
        assert!(parse_event_date("ontem").is_none());
        assert!(parse_event_date("").is_none());
    }
}
