//! Download stage: resolve the aggregator URL, fetch HTML, reconcile the
//! body, advance the source to `downloaded`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use vigia_archive::{reconcile, BodyExtractor, FetchError, PageFetcher, UrlResolver};
use vigia_common::{dates, SourceStatus};
use vigia_store::Store;

/// Everything one download worker needs. Shared read-only across the pool.
pub struct DownloadDeps {
    pub store: Store,
    pub resolver: UrlResolver,
    pub fetcher: Arc<dyn PageFetcher>,
    pub extractor: Arc<dyn BodyExtractor>,
    pub min_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Content stored, source advanced to `downloaded`.
    Downloaded,
    /// Nothing to do (content already present, source missing, or skipped).
    Unchanged,
    /// Permanent failure; the source was marked `failed`.
    Failed,
    /// Transient failure; the source keeps its state for the next run.
    Errored,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadReport {
    pub completed: u32,
    pub downloaded: u32,
    pub failed: u32,
    pub errors: u32,
}

impl std::fmt::Display for DownloadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} completed, {} downloaded, {} failed, {} errors",
            self.completed, self.downloaded, self.failed, self.errors
        )
    }
}

/// Download one source. This is the per-record body shared by the worker
/// pool, the queue's per-record job, and the extract stage's
/// ensure-content step.
pub async fn download_one(deps: &DownloadDeps, source_id: i64, force: bool) -> Result<DownloadOutcome> {
    let Some(source) = deps.store.get_source(source_id).await? else {
        warn!(source_id, "Source vanished before download");
        return Ok(DownloadOutcome::Unchanged);
    };

    // 1. Resolve the aggregator URL. Best-effort; failures keep the input.
    if source.resolved_url.is_none() || force {
        let resolved = deps.resolver.resolve(&source.url).await;
        if resolved != source.url {
            deps.store.set_source_resolved_url(source_id, &resolved).await?;
        }
    }

    // Reload so the effective URL reflects the resolution we just wrote.
    let Some(source) = deps.store.get_source(source_id).await? else {
        return Ok(DownloadOutcome::Unchanged);
    };

    if source.content.is_some() && !force {
        return Ok(DownloadOutcome::Unchanged);
    }
    if source.status() == SourceStatus::Failed && !force {
        return Ok(DownloadOutcome::Unchanged);
    }

    // 2. Fetch and reconcile.
    let html = match deps.fetcher.fetch(source.effective_url()).await {
        Ok(html) => html,
        Err(FetchError::Permanent(reason)) => {
            warn!(source_id, url = source.effective_url(), reason, "Permanent fetch failure");
            deps.store
                .set_source_status(source_id, SourceStatus::Failed, force)
                .await?;
            return Ok(DownloadOutcome::Failed);
        }
        Err(FetchError::Transient(reason)) => {
            warn!(source_id, url = source.effective_url(), reason, "Transient fetch failure");
            return Ok(DownloadOutcome::Errored);
        }
    };

    let reconciled = reconcile(deps.extractor.as_ref(), &html, deps.min_year);
    let Some(body) = reconciled.body.filter(|b| !b.trim().is_empty()) else {
        // Extractor came up empty; the source stays where it is and the
        // next run retries. Only fetch-level failures are permanent.
        warn!(source_id, url = source.effective_url(), "No body from any extraction strategy");
        return Ok(DownloadOutcome::Errored);
    };

    // 3. Reconcile the publication date and commit atomically.
    let best_date = dates::best_publication_date(reconciled.published_at, source.published_at);
    if let (Some(date), Some(previous)) = (best_date, source.published_at) {
        if date != previous {
            info!(source_id, from = %previous, to = %date, "Updated publication date");
        }
    }
    deps.store
        .store_source_content(source_id, &body, best_date, force)
        .await?;

    Ok(DownloadOutcome::Downloaded)
}

/// Run the bounded worker pool over a batch of source ids. The shutdown
/// flag is polled between records; in-flight records always finish.
pub async fn run_download(
    deps: Arc<DownloadDeps>,
    source_ids: Vec<i64>,
    force: bool,
    workers: usize,
    shutdown: Arc<AtomicBool>,
) -> Result<DownloadReport> {
    let total = source_ids.len();
    if total == 0 {
        info!("No sources to download");
        return Ok(DownloadReport::default());
    }

    info!(total, workers, "Starting content download");
    let started = Instant::now();
    let completed = Arc::new(AtomicU32::new(0));

    let outcomes: Vec<DownloadOutcome> = stream::iter(source_ids.into_iter().map(|source_id| {
        let deps = Arc::clone(&deps);
        let shutdown = Arc::clone(&shutdown);
        let completed = Arc::clone(&completed);
        async move {
            if shutdown.load(Ordering::SeqCst) {
                return DownloadOutcome::Unchanged;
            }
            let outcome = match download_one(&deps, source_id, force).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(source_id, error = %e, "Download worker error");
                    DownloadOutcome::Errored
                }
            };

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if done % 10 == 0 || done as usize == total {
                let elapsed = started.elapsed().as_secs_f64();
                let avg = elapsed / done as f64;
                let remaining = avg * (total as f64 - done as f64);
                info!(
                    "Download progress: {done}/{total} ({:.1}%) | Elapsed: {elapsed:.1}s | ETA: {remaining:.1}s",
                    done as f64 / total as f64 * 100.0
                );
            }
            outcome
        }
    }))
    .buffer_unordered(workers.max(1))
    .collect()
    .await;

    let mut report = DownloadReport {
        completed: outcomes.len() as u32,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            DownloadOutcome::Downloaded => report.downloaded += 1,
            DownloadOutcome::Failed => report.failed += 1,
            DownloadOutcome::Errored => report.errors += 1,
            DownloadOutcome::Unchanged => {}
        }
    }

    info!(%report, elapsed_s = started.elapsed().as_secs(), "Content download complete");
    Ok(report)
}
