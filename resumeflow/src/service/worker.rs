//! Dispatcher loop feeding queued jobs to the orchestrator.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::context::JobContext;
use crate::core::JobId;
use crate::orchestrator::Orchestrator;

/// Cause recorded on jobs that were still queued at shutdown.
pub(super) const SHUTTING_DOWN: &str = "service shutting down";

/// A job waiting for a worker.
#[derive(Debug)]
pub(super) struct QueuedJob {
    pub id: JobId,
    pub ctx: Arc<JobContext>,
}

/// Dequeues jobs and runs each as its own task, at most `max_concurrent`
/// at a time. Returns once the queue is closed and every task finished.
pub(super) async fn dispatch(
    orchestrator: Orchestrator,
    mut queue: mpsc::Receiver<QueuedJob>,
    max_concurrent: usize,
    shutting_down: Arc<AtomicBool>,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let mut tasks = JoinSet::new();

    while let Some(job) = queue.recv().await {
        while let Some(finished) = tasks.try_join_next() {
            log_join(finished);
        }

        if shutting_down.load(Ordering::SeqCst) {
            reject(&orchestrator, job.id).await;
            continue;
        }
        let Ok(permit) = permits.clone().acquire_owned().await else {
            reject(&orchestrator, job.id).await;
            continue;
        };
        if shutting_down.load(Ordering::SeqCst) {
            reject(&orchestrator, job.id).await;
            continue;
        }

        let orchestrator = orchestrator.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let outcome = AssertUnwindSafe(orchestrator.run(job.id, &job.ctx))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(status)) => debug!(job_id = %job.id, status = %status, "Worker finished job"),
                Ok(Err(e)) => error!(job_id = %job.id, error = %e, "Worker failed job"),
                Err(_) => {
                    error!(job_id = %job.id, "Worker panicked");
                    if let Err(e) = orchestrator.abort(job.id, "worker panicked").await {
                        warn!(job_id = %job.id, error = %e, "Could not fail panicked job");
                    }
                }
            }
        });
    }

    info!(in_flight = tasks.len(), "Job queue closed, draining workers");
    while let Some(finished) = tasks.join_next().await {
        log_join(finished);
    }
}

async fn reject(orchestrator: &Orchestrator, id: JobId) {
    if let Err(e) = orchestrator.reject(id, SHUTTING_DOWN).await {
        warn!(job_id = %id, error = %e, "Could not reject queued job");
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "Worker task ended abnormally");
    }
}
