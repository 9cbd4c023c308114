use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use vigia_archive::{FeedFetcher, HttpFetcher, ReadabilityExtractor, RedirectDecoder, UrlResolver};
use vigia_common::Config;
use vigia_pipeline::stages::download::{run_download, DownloadDeps};
use vigia_pipeline::stages::enrich::{run_enrich, EnrichOptions};
use vigia_pipeline::stages::extract::{run_extract, ExtractDeps};
use vigia_pipeline::stages::ingest::{run_ingest, IngestOptions};
use vigia_pipeline::{
    merge, DedupResolver, EventClassifier, Job, LlmExtractor, PipelineExecutor, RunStats,
    StubClassifier, TaskQueue,
};
use vigia_pipeline::notify::LogNotifier;
use vigia_store::Store;

#[derive(Parser)]
#[command(name = "vigia")]
#[command(about = "Violent-death news pipeline: ingest, extract, deduplicate")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the aggregator feed grid and download new article content
    Fetch {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,

        /// Search query (defaults to the configured base query)
        #[arg(long)]
        query: Option<String>,

        /// Expand the query with related violence topics
        #[arg(long)]
        expand: bool,

        /// Expand the query with city localities
        #[arg(long)]
        geo: bool,

        /// Re-resolve and re-download even when already done
        #[arg(long)]
        force: bool,

        /// Download worker pool size
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Run keyword gate + LLM extraction over undone sources
    Extract {
        /// Re-extract already-processed sources
        #[arg(long)]
        force: bool,

        /// Limit the number of sources to process
        #[arg(long)]
        limit: Option<i64>,

        /// Extraction worker pool size
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Link extractions to incidents, creating incidents for unmatched ones
    Enrich {
        /// Preview changes without committing
        #[arg(long)]
        dry_run: bool,

        /// Do not auto-create incidents for unmatched extractions
        #[arg(long)]
        no_create: bool,

        /// Worker pool size (reserved; enrichment is sequential per run)
        #[arg(long)]
        max_workers: Option<usize>,
    },

    /// Merge duplicate incidents inside the same date block
    Deduplicate {
        /// Preview merges without committing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the full pipeline with stage chaining
    RunAll {
        #[arg(long)]
        force: bool,

        #[arg(long)]
        expand: bool,

        #[arg(long)]
        geo: bool,

        #[arg(long)]
        workers: Option<usize>,

        #[arg(long)]
        start_date: Option<String>,

        #[arg(long)]
        end_date: Option<String>,

        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_tracing()?;

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = Store::connect(&config.database_url).await?;

    // Cold-start LLM credential check: done once, here.
    let classifier: Arc<dyn EventClassifier> = if config.has_llm_credentials() {
        Arc::new(LlmExtractor::new(&config.anthropic_api_key, &config.llm_model))
    } else {
        info!("No LLM credentials; extraction will emit fallback stubs");
        Arc::new(StubClassifier)
    };

    let download = Arc::new(DownloadDeps {
        store: store.clone(),
        resolver: UrlResolver::new(Box::new(RedirectDecoder::new())),
        fetcher: Arc::new(HttpFetcher::new()),
        extractor: Arc::new(ReadabilityExtractor),
        min_year: config.min_year,
    });
    let extract = Arc::new(ExtractDeps {
        store: store.clone(),
        classifier,
        download: Arc::clone(&download),
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, finishing in-flight records");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    match cli.command {
        Commands::Fetch {
            start_date,
            end_date,
            query,
            expand,
            geo,
            force,
            max_workers,
        } => {
            let opts = IngestOptions {
                start_date: parse_cli_date(start_date.as_deref())?,
                end_date: parse_cli_date(end_date.as_deref())?,
                query,
                expand,
                geo,
                force,
            };
            let fetcher = FeedFetcher::new();
            let (report, to_download) = run_ingest(
                &store,
                &fetcher,
                &config.base_query,
                config.min_year,
                &opts,
            )
            .await?;
            println!("Ingest: {report}");

            let download_report = run_download(
                Arc::clone(&download),
                to_download,
                force,
                max_workers.unwrap_or(config.workers),
                shutdown,
            )
            .await?;
            println!("Download: {download_report}");
        }

        Commands::Extract {
            force,
            limit,
            workers,
        } => {
            let ids = store.list_extractable_source_ids(force, limit).await?;
            let (report, _) = run_extract(
                Arc::clone(&extract),
                ids,
                force,
                workers.unwrap_or(config.workers),
                shutdown,
            )
            .await?;
            println!("Extract: {report}");
        }

        Commands::Enrich {
            dry_run,
            no_create,
            max_workers: _,
        } => {
            let opts = EnrichOptions {
                auto_create: !no_create,
                dry_run,
            };
            let report = run_enrich(&store, &config.city, &opts).await?;
            println!("Enrich{}: {report}", if dry_run { " (dry run)" } else { "" });
        }

        Commands::Deduplicate { dry_run } => {
            let report = merge::run_merge(&store, dry_run).await?;
            println!(
                "Deduplicate{}: {report}",
                if dry_run { " (dry run)" } else { "" }
            );
        }

        Commands::RunAll {
            force,
            expand,
            geo,
            workers,
            start_date,
            end_date,
            query,
        } => {
            let opts = IngestOptions {
                start_date: parse_cli_date(start_date.as_deref())?,
                end_date: parse_cli_date(end_date.as_deref())?,
                query,
                expand,
                geo,
                force,
            };
            let fetcher = FeedFetcher::new();
            let (ingest_report, to_download) = run_ingest(
                &store,
                &fetcher,
                &config.base_query,
                config.min_year,
                &opts,
            )
            .await?;

            // Seed the queue with one download per new/pending source plus
            // the recovery sweeps; chaining carries each record forward.
            let mut seed: Vec<Job> = to_download
                .iter()
                .map(|&source_id| Job::Download { source_id })
                .collect();
            seed.push(Job::ExtractReady { limit: 500 });
            seed.push(Job::BatchDedup { limit: 500 });

            let executor = Arc::new(PipelineExecutor {
                store: store.clone(),
                download: Arc::clone(&download),
                extract: Arc::clone(&extract),
                resolver: DedupResolver::new(store.clone()),
                city: config.city.clone(),
                force,
                stats: Default::default(),
            });
            let queue = TaskQueue::new(
                workers.unwrap_or(config.workers),
                Arc::new(LogNotifier),
                Arc::new(LogNotifier),
            );
            let queue_report = queue.run(executor.clone(), seed, shutdown).await;

            let (download_report, extract_report, enrich_report) = executor.stats.snapshot();
            let stats = RunStats {
                ingest: ingest_report,
                download: download_report,
                extract: extract_report,
                enrich: enrich_report,
                queue: Some(queue_report),
            };
            println!("{stats}");
        }
    }

    Ok(())
}

fn parse_cli_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;
    let file_appender = tracing_appender::rolling::daily("logs", "pipeline.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid LOG_LEVEL")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}
