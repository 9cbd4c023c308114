//! Task queue with per-key singleflight and stage chaining.
//!
//! Jobs are keyed by `(stage, record_id)`; enqueueing a key the run has
//! already seen is a no-op. Per-record jobs chain the next stage on
//! success. Batch jobs sweep by status filter and chain the next batch
//! sweep when they yield work. Failures notify, file an issue, and are
//! recorded by the queue; peers keep running.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use vigia_common::{keywords, SourceStatus};

use crate::dedup::DedupResolver;
use crate::notify::{IssueFiler, Notifier};
use crate::stages::download::{download_one, DownloadDeps, DownloadOutcome, DownloadReport};
use crate::stages::enrich::{enrich_one, run_enrich, EnrichOptions, EnrichOutcome, EnrichReport};
use crate::stages::extract::{extract_one, ExtractDeps, ExtractOutcome, ExtractReport};
use vigia_store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    Extract,
    Enrich,
    ClassifyPending,
    DownloadClassified,
    ExtractReady,
    BatchDedup,
    BatchEnrich,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Enrich => "enrich",
            Stage::ClassifyPending => "classify_pending",
            Stage::DownloadClassified => "download_classified",
            Stage::ExtractReady => "extract_ready",
            Stage::BatchDedup => "batch_dedup",
            Stage::BatchEnrich => "batch_enrich",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    Download { source_id: i64 },
    Extract { source_id: i64 },
    Enrich { event_id: i64 },
    ClassifyPending { limit: i64 },
    DownloadClassified { limit: i64 },
    ExtractReady { limit: i64 },
    BatchDedup { limit: i64 },
    BatchEnrich { limit: i64 },
}

impl Job {
    pub fn stage(&self) -> Stage {
        match self {
            Job::Download { .. } => Stage::Download,
            Job::Extract { .. } => Stage::Extract,
            Job::Enrich { .. } => Stage::Enrich,
            Job::ClassifyPending { .. } => Stage::ClassifyPending,
            Job::DownloadClassified { .. } => Stage::DownloadClassified,
            Job::ExtractReady { .. } => Stage::ExtractReady,
            Job::BatchDedup { .. } => Stage::BatchDedup,
            Job::BatchEnrich { .. } => Stage::BatchEnrich,
        }
    }

    /// Singleflight key. Batch sweeps share record id 0: one sweep of a
    /// kind per run.
    pub fn key(&self) -> (Stage, i64) {
        let record_id = match self {
            Job::Download { source_id } | Job::Extract { source_id } => *source_id,
            Job::Enrich { event_id } => *event_id,
            _ => 0,
        };
        (self.stage(), record_id)
    }

    pub fn record_id(&self) -> Option<i64> {
        match self {
            Job::Download { source_id } | Job::Extract { source_id } => Some(*source_id),
            Job::Enrich { event_id } => Some(*event_id),
            _ => None,
        }
    }
}

/// Executes one job and returns the follow-on jobs to chain.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: Job) -> Result<Vec<Job>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueReport {
    pub executed: u32,
    pub failed: u32,
    pub deduplicated: u32,
}

impl std::fmt::Display for QueueReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} executed, {} failed, {} deduplicated",
            self.executed, self.failed, self.deduplicated
        )
    }
}

/// In-process dispatcher: bounded concurrency, singleflight keys, forward
/// chaining. Runs until the queue drains or shutdown is requested.
pub struct TaskQueue {
    workers: usize,
    notifier: Arc<dyn Notifier>,
    issue_filer: Arc<dyn IssueFiler>,
}

impl TaskQueue {
    pub fn new(
        workers: usize,
        notifier: Arc<dyn Notifier>,
        issue_filer: Arc<dyn IssueFiler>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            notifier,
            issue_filer,
        }
    }

    pub async fn run(
        &self,
        executor: Arc<dyn JobExecutor>,
        seed: Vec<Job>,
        shutdown: Arc<AtomicBool>,
    ) -> QueueReport {
        let mut report = QueueReport::default();
        let mut seen: HashSet<(Stage, i64)> = HashSet::new();
        let mut pending: VecDeque<Job> = VecDeque::new();

        for job in seed {
            if seen.insert(job.key()) {
                pending.push_back(job);
            } else {
                report.deduplicated += 1;
            }
        }

        let mut running = FuturesUnordered::new();

        loop {
            while running.len() < self.workers && !shutdown.load(Ordering::SeqCst) {
                let Some(job) = pending.pop_front() else {
                    break;
                };
                let executor = Arc::clone(&executor);
                running.push(async move {
                    let result = executor.execute(job).await;
                    (job, result)
                });
            }

            let Some((job, result)) = running.next().await else {
                break;
            };

            match result {
                Ok(follow_ons) => {
                    report.executed += 1;
                    for next in follow_ons {
                        if seen.insert(next.key()) {
                            debug!(stage = next.stage().name(), "Chained job");
                            pending.push_back(next);
                        } else {
                            report.deduplicated += 1;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    let task = job.stage().name();
                    let message = e.to_string();
                    self.notifier
                        .job_failed(task, &message, job.record_id())
                        .await;
                    self.issue_filer
                        .file_failure(task, &message, job.record_id())
                        .await;
                }
            }
        }

        info!(%report, "Queue drained");
        report
    }
}

/// Per-record counters accumulated across a queue run.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub downloaded: AtomicU32,
    pub download_failed: AtomicU32,
    pub events_created: AtomicU32,
    pub events_updated: AtomicU32,
    pub sources_skipped: AtomicU32,
    pub linked: AtomicU32,
    pub incidents_created: AtomicU32,
}

impl ExecutorStats {
    /// Fold the counters into per-stage reports for the run rollup.
    pub fn snapshot(&self) -> (DownloadReport, ExtractReport, EnrichReport) {
        let download = DownloadReport {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            failed: self.download_failed.load(Ordering::Relaxed),
            ..Default::default()
        };
        let extract = ExtractReport {
            created: self.events_created.load(Ordering::Relaxed),
            updated: self.events_updated.load(Ordering::Relaxed),
            skipped: self.sources_skipped.load(Ordering::Relaxed),
            ..Default::default()
        };
        let enrich = EnrichReport {
            linked: self.linked.load(Ordering::Relaxed),
            created: self.incidents_created.load(Ordering::Relaxed),
            ..Default::default()
        };
        (download, extract, enrich)
    }
}

/// The production executor: wires every stage to the shared deps.
pub struct PipelineExecutor {
    pub store: Store,
    pub download: Arc<DownloadDeps>,
    pub extract: Arc<ExtractDeps>,
    pub resolver: DedupResolver,
    pub city: String,
    pub force: bool,
    pub stats: ExecutorStats,
}

#[async_trait]
impl JobExecutor for PipelineExecutor {
    async fn execute(&self, job: Job) -> Result<Vec<Job>> {
        match job {
            Job::Download { source_id } => {
                match download_one(&self.download, source_id, self.force).await? {
                    DownloadOutcome::Downloaded => {
                        self.stats.downloaded.fetch_add(1, Ordering::Relaxed);
                        Ok(vec![Job::Extract { source_id }])
                    }
                    DownloadOutcome::Unchanged => Ok(vec![Job::Extract { source_id }]),
                    DownloadOutcome::Failed => {
                        self.stats.download_failed.fetch_add(1, Ordering::Relaxed);
                        Ok(vec![])
                    }
                    DownloadOutcome::Errored => Ok(vec![]),
                }
            }
            Job::Extract { source_id } => {
                match extract_one(&self.extract, source_id, self.force).await? {
                    ExtractOutcome::Created { event_id } => {
                        self.stats.events_created.fetch_add(1, Ordering::Relaxed);
                        Ok(vec![Job::Enrich { event_id }])
                    }
                    ExtractOutcome::Updated { event_id } => {
                        self.stats.events_updated.fetch_add(1, Ordering::Relaxed);
                        Ok(vec![Job::Enrich { event_id }])
                    }
                    _ => {
                        self.stats.sources_skipped.fetch_add(1, Ordering::Relaxed);
                        Ok(vec![])
                    }
                }
            }
            Job::Enrich { event_id } => {
                match enrich_one(
                    &self.store,
                    &self.resolver,
                    &self.city,
                    event_id,
                    &EnrichOptions::default(),
                )
                .await?
                {
                    EnrichOutcome::Linked { .. } => {
                        self.stats.linked.fetch_add(1, Ordering::Relaxed);
                    }
                    EnrichOutcome::Created { .. } => {
                        self.stats.incidents_created.fetch_add(1, Ordering::Relaxed);
                    }
                    EnrichOutcome::Skipped => {}
                }
                Ok(vec![])
            }
            Job::ClassifyPending { limit } => {
                // Headline-level keyword screen over pending sources. A
                // title miss is not a discard: the definitive gate runs on
                // full content at extract time.
                let ids = self
                    .store
                    .list_source_ids_by_status(SourceStatus::Pending, limit)
                    .await?;
                let mut jobs = Vec::new();
                for id in ids {
                    let Some(source) = self.store.get_source(id).await? else {
                        continue;
                    };
                    if source.title.is_empty() || !keywords::matches(&source.title).is_empty() {
                        jobs.push(Job::Download { source_id: id });
                    }
                }
                info!(enqueued = jobs.len(), "classify_pending sweep");
                Ok(jobs)
            }
            Job::DownloadClassified { limit } => {
                let ids = self
                    .store
                    .list_source_ids_by_status(SourceStatus::Pending, limit)
                    .await?;
                let yielded = ids.len() as i64;
                let mut jobs: Vec<Job> = ids
                    .into_iter()
                    .map(|source_id| Job::Download { source_id })
                    .collect();
                if yielded > 0 {
                    jobs.push(Job::ExtractReady { limit });
                }
                info!(yielded, "download_classified sweep");
                Ok(jobs)
            }
            Job::ExtractReady { limit } => {
                let ids = self
                    .store
                    .list_source_ids_by_status(SourceStatus::Downloaded, limit)
                    .await?;
                let yielded = ids.len() as i64;
                let mut jobs: Vec<Job> = ids
                    .into_iter()
                    .map(|source_id| Job::Extract { source_id })
                    .collect();
                if yielded > 0 {
                    jobs.push(Job::BatchDedup { limit });
                }
                info!(yielded, "extract_ready sweep");
                Ok(jobs)
            }
            Job::BatchDedup { limit } => {
                // Phase 1: link unlinked extractions to existing incidents.
                let unlinked = self.store.list_unlinked_events_with_date().await?;
                let yielded = unlinked.len().min(limit.max(0) as usize);
                let opts = EnrichOptions {
                    auto_create: false,
                    dry_run: false,
                };
                for event in unlinked.iter().take(yielded) {
                    if let EnrichOutcome::Linked { .. } =
                        enrich_one(&self.store, &self.resolver, &self.city, event.id, &opts).await?
                    {
                        self.stats.linked.fetch_add(1, Ordering::Relaxed);
                    }
                }
                info!(yielded, "batch_dedup sweep");
                if yielded > 0 {
                    Ok(vec![Job::BatchEnrich { limit }])
                } else {
                    Ok(vec![])
                }
            }
            Job::BatchEnrich { limit: _ } => {
                // Phase 2: mint incidents for whatever phase 1 left behind.
                let report = run_enrich(&self.store, &self.city, &EnrichOptions::default()).await?;
                info!(%report, "batch_enrich sweep");
                Ok(vec![])
            }
        }
    }
}
