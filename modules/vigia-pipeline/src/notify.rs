//! Failure notification seams.
//!
//! Transports (chat, issue tracker) live outside this crate; the pipeline
//! only talks to these traits. The defaults log through tracing so a bare
//! deployment still records every failure.

use async_trait::async_trait;
use tracing::error;

/// Push-style alert sink for per-job failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn job_failed(&self, task: &str, message: &str, record_id: Option<i64>);
}

/// Issue-tracker filing for per-job failures.
#[async_trait]
pub trait IssueFiler: Send + Sync {
    async fn file_failure(&self, task: &str, message: &str, record_id: Option<i64>);
}

/// Default sink: structured error logs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn job_failed(&self, task: &str, message: &str, record_id: Option<i64>) {
        error!(task, record_id, message, "Job failed");
    }
}

#[async_trait]
impl IssueFiler for LogNotifier {
    async fn file_failure(&self, task: &str, message: &str, record_id: Option<i64>) {
        error!(task, record_id, message, "Failure filed");
    }
}
