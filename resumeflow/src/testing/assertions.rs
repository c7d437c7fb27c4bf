//! Assertions and polling helpers for jobs.

use std::time::Duration;

use crate::core::{Job, JobId, JobStatus};
use crate::service::JobService;
use crate::stages::StageId;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Polls `service` until job `id` is terminal or `timeout` elapses.
///
/// Returns `None` on timeout or if the job does not exist.
pub async fn wait_for_terminal(service: &JobService, id: JobId, timeout: Duration) -> Option<Job> {
    let poll = async {
        loop {
            match service.status(id).await {
                Ok(job) if job.status.is_terminal() => return Some(job),
                Ok(_) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(_) => return None,
            }
        }
    };
    tokio::time::timeout(timeout, poll).await.ok().flatten()
}

/// Asserts that the job completed with a result and no error.
pub fn assert_job_completed(job: &Job) {
    assert_eq!(
        job.status,
        JobStatus::Completed,
        "Expected completed job, got {} (error: {:?})",
        job.status,
        job.error
    );
    assert!(job.result.is_some(), "Completed job has no result");
    assert!(job.error.is_none(), "Completed job has an error");
}

/// Asserts that the job failed in `stage` with no result.
pub fn assert_job_failed_at(job: &Job, stage: StageId) {
    assert_eq!(job.status, JobStatus::Failed, "Expected failed job, got {}", job.status);
    assert!(job.result.is_none(), "Failed job has a result");
    let error = job.error.as_ref();
    assert_eq!(
        error.and_then(|e| e.stage.as_deref()),
        Some(stage.as_str()),
        "Expected failure in stage '{stage}', got {error:?}"
    );
}

/// Asserts that the job was cancelled with no result.
pub fn assert_job_cancelled(job: &Job) {
    assert_eq!(
        job.status,
        JobStatus::Cancelled,
        "Expected cancelled job, got {}",
        job.status
    );
    assert!(job.result.is_none(), "Cancelled job has a result");
}
