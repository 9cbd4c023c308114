//! Queue mechanics: chaining, singleflight, failure notification, and
//! cooperative shutdown, exercised with fake executors.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use vigia_pipeline::notify::{IssueFiler, Notifier};
use vigia_pipeline::{Job, JobExecutor, TaskQueue};

#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<Job>>,
    fail_on: Option<Job>,
}

#[async_trait]
impl JobExecutor for RecordingExecutor {
    async fn execute(&self, job: Job) -> Result<Vec<Job>> {
        self.executed.lock().unwrap().push(job);
        if self.fail_on == Some(job) {
            anyhow::bail!("boom");
        }
        // download → extract → enrich, then stop.
        Ok(match job {
            Job::Download { source_id } => vec![Job::Extract { source_id }],
            Job::Extract { source_id } => vec![Job::Enrich { event_id: source_id + 100 }],
            _ => vec![],
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    failures: Mutex<Vec<(String, Option<i64>)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn job_failed(&self, task: &str, _message: &str, record_id: Option<i64>) {
        self.failures.lock().unwrap().push((task.to_string(), record_id));
    }
}

#[async_trait]
impl IssueFiler for RecordingNotifier {
    async fn file_failure(&self, task: &str, _message: &str, record_id: Option<i64>) {
        self.failures.lock().unwrap().push((format!("issue:{task}"), record_id));
    }
}

fn queue(workers: usize, notifier: Arc<RecordingNotifier>) -> TaskQueue {
    TaskQueue::new(workers, notifier.clone(), notifier)
}

#[tokio::test]
async fn download_chains_through_extract_to_enrich() {
    let executor = Arc::new(RecordingExecutor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let report = queue(2, notifier)
        .run(
            executor.clone(),
            vec![Job::Download { source_id: 1 }],
            shutdown,
        )
        .await;

    assert_eq!(report.executed, 3);
    assert_eq!(report.failed, 0);
    let executed = executor.executed.lock().unwrap();
    assert_eq!(
        *executed,
        vec![
            Job::Download { source_id: 1 },
            Job::Extract { source_id: 1 },
            Job::Enrich { event_id: 101 },
        ]
    );
}

#[tokio::test]
async fn same_key_is_singleflight_within_a_run() {
    let executor = Arc::new(RecordingExecutor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let report = queue(4, notifier)
        .run(
            executor.clone(),
            vec![
                Job::Download { source_id: 7 },
                Job::Download { source_id: 7 },
                Job::Download { source_id: 8 },
            ],
            shutdown,
        )
        .await;

    assert_eq!(report.deduplicated, 1);
    let downloads = executor
        .executed
        .lock()
        .unwrap()
        .iter()
        .filter(|j| matches!(j, Job::Download { .. }))
        .count();
    assert_eq!(downloads, 2);
}

#[tokio::test]
async fn distinct_records_are_distinct_keys() {
    let executor = Arc::new(RecordingExecutor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let report = queue(4, notifier)
        .run(
            executor.clone(),
            vec![
                Job::Download { source_id: 1 },
                Job::Download { source_id: 2 },
                Job::Download { source_id: 3 },
            ],
            shutdown,
        )
        .await;

    // 3 downloads, 3 extracts, 3 enriches.
    assert_eq!(report.executed, 9);
    assert_eq!(report.deduplicated, 0);
}

#[tokio::test]
async fn failures_notify_and_file_but_do_not_stop_peers() {
    let executor = Arc::new(RecordingExecutor {
        executed: Mutex::new(Vec::new()),
        fail_on: Some(Job::Extract { source_id: 1 }),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let report = queue(1, notifier.clone())
        .run(
            executor.clone(),
            vec![
                Job::Download { source_id: 1 },
                Job::Download { source_id: 2 },
            ],
            shutdown,
        )
        .await;

    assert_eq!(report.failed, 1);
    // Record 2's chain still ran to completion.
    assert!(executor
        .executed
        .lock()
        .unwrap()
        .contains(&Job::Enrich { event_id: 102 }));

    let failures = notifier.failures.lock().unwrap();
    assert!(failures.contains(&("extract".to_string(), Some(1))));
    assert!(failures.contains(&("issue:extract".to_string(), Some(1))));
}

#[tokio::test]
async fn shutdown_flag_stops_dispatch() {
    let executor = Arc::new(RecordingExecutor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(true));

    let report = queue(2, notifier)
        .run(
            executor.clone(),
            vec![Job::Download { source_id: 1 }],
            shutdown,
        )
        .await;

    assert_eq!(report.executed, 0);
    assert!(executor.executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn batch_jobs_share_one_key_per_stage() {
    let executor = Arc::new(RecordingExecutor::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let report = queue(2, notifier)
        .run(
            executor.clone(),
            vec![
                Job::ExtractReady { limit: 10 },
                Job::ExtractReady { limit: 50 },
            ],
            shutdown,
        )
        .await;

    assert_eq!(report.executed, 1);
    assert_eq!(report.deduplicated, 1);
}
