//! Job submission and the worker pool behind it.
//!
//! [`JobService::submit`] validates a request, creates the job and hands it
//! to a bounded queue, returning the id without waiting for the pipeline.
//! A dispatcher task drains the queue into at most `max_concurrent_jobs`
//! concurrent orchestrations.

mod worker;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::agents::{ModelProvider, PageFetcher};
use crate::artifacts::{ArtifactError, ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
use crate::config::{ResumeflowConfig, WorkerConfig};
use crate::context::{JobContext, JobRequest};
use crate::core::{Job, JobId, JobStatus};
use crate::errors::{PipelineValidationError, ValidationError};
use crate::events::EventSink;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::pipeline::AgentPipeline;
use crate::store::{InMemoryJobStore, JobStore, StoreError};
use crate::uploads::{ResumeUploads, UploadError, UploadedResume};
use worker::{dispatch, QueuedJob, SHUTTING_DOWN};

/// Errors returned to callers of [`JobService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was malformed. No job was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No job has this id.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The job is in the wrong state for the operation.
    #[error("Job {job_id} is {status}: {message}")]
    Conflict {
        /// The job.
        job_id: JobId,
        /// Its current status.
        status: JobStatus,
        /// What was attempted.
        message: String,
    },

    /// The queue was full. The job exists and has been failed.
    #[error("Job queue is full; job {0} was rejected")]
    QueueFull(JobId),

    /// The service is shutting down. The job exists and has been failed.
    #[error("Service is shutting down; job {0} was rejected")]
    ShuttingDown(JobId),

    /// A resume upload was refused.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Artifact storage failed or the artifact does not exist.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// The job store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<OrchestratorError> for ServiceError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Store(e) => e.into(),
            OrchestratorError::AlreadyTerminal { job_id, status } => Self::Conflict {
                job_id,
                status,
                message: "job already finished".to_string(),
            },
        }
    }
}

/// Accepts jobs and runs them in the background.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct JobService {
    orchestrator: Orchestrator,
    config: WorkerConfig,
    uploads: Arc<ResumeUploads>,
    queue: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
}

impl JobService {
    /// Starts the dispatcher for `orchestrator`.
    #[must_use]
    pub fn new(config: WorkerConfig, orchestrator: Orchestrator) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shutting_down = Arc::new(AtomicBool::new(false));
        let dispatcher = tokio::spawn(dispatch(
            orchestrator.clone(),
            receiver,
            config.max_concurrent_jobs,
            shutting_down.clone(),
        ));
        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            queue_capacity = config.queue_capacity,
            "Job service started"
        );
        Self {
            orchestrator,
            config,
            uploads: Arc::new(ResumeUploads::new()),
            queue: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
            shutting_down,
        }
    }

    /// Wires the default resume optimizer from `config`.
    ///
    /// Jobs are kept in memory. Artifacts go to `config.artifacts.root` when
    /// set, otherwise to memory.
    pub fn from_config(
        config: &ResumeflowConfig,
        provider: Arc<dyn ModelProvider>,
        fetcher: Option<Arc<dyn PageFetcher>>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, PipelineValidationError> {
        let pipeline = AgentPipeline::resume_optimizer(provider, fetcher, config.retry.clone())?;
        let artifacts: Arc<dyn ArtifactStore> = match &config.artifacts.root {
            Some(root) => Arc::new(FsArtifactStore::new(root)),
            None => Arc::new(InMemoryArtifactStore::new()),
        };
        let orchestrator = Orchestrator::new(Arc::new(InMemoryJobStore::new()), Arc::new(pipeline))
            .with_artifacts(artifacts)
            .with_events(events);
        Ok(Self::new(config.workers.clone(), orchestrator))
    }

    /// Worker configuration in effect.
    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shares an existing upload store.
    #[must_use]
    pub fn with_uploads(mut self, uploads: Arc<ResumeUploads>) -> Self {
        self.uploads = uploads;
        self
    }

    /// Uploaded resumes available to submissions.
    #[must_use]
    pub fn uploads(&self) -> &Arc<ResumeUploads> {
        &self.uploads
    }

    /// The orchestrator jobs run on.
    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn store(&self) -> &Arc<dyn JobStore> {
        self.orchestrator.store()
    }

    /// Validates `request`, creates a job and queues it.
    ///
    /// Returns as soon as the job is queued. When the queue refuses the job,
    /// it is failed and the error names it so it can still be queried.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId, ServiceError> {
        let ctx = JobContext::try_from(request.resolve_upload(&self.uploads)?)?;
        let job = self.store().create(ctx.summary()).await;
        let id = job.id;

        let sender = self.queue.lock().clone();
        let refusal = match sender {
            Some(sender) => match sender.try_send(QueuedJob {
                id,
                ctx: Arc::new(ctx),
            }) {
                Ok(()) => {
                    info!(job_id = %id, "Job queued");
                    return Ok(id);
                }
                Err(TrySendError::Full(_)) => ServiceError::QueueFull(id),
                Err(TrySendError::Closed(_)) => ServiceError::ShuttingDown(id),
            },
            None => ServiceError::ShuttingDown(id),
        };

        let cause = match refusal {
            ServiceError::QueueFull(_) => "job queue is full",
            _ => SHUTTING_DOWN,
        };
        warn!(job_id = %id, cause, "Job refused by the queue");
        self.orchestrator.reject(id, cause).await?;
        Err(refusal)
    }

    /// Stores a resume document for later submissions.
    pub fn upload_resume(
        &self,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<UploadedResume, ServiceError> {
        Ok(self.uploads.put(content_type, bytes)?)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, id: JobId) -> Result<Job, ServiceError> {
        Ok(self.store().get(id).await?)
    }

    /// Every job, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        self.store().list().await
    }

    /// Cancels a queued or running job.
    pub async fn cancel(&self, id: JobId, reason: &str) -> Result<Job, ServiceError> {
        Ok(self.orchestrator.cancel(id, reason).await?)
    }

    /// Removes a finished job and its artifacts.
    pub async fn delete(&self, id: JobId) -> Result<Job, ServiceError> {
        let job = self.store().get(id).await?;
        if !job.status.is_terminal() {
            return Err(ServiceError::Conflict {
                job_id: id,
                status: job.status,
                message: "only finished jobs can be deleted".to_string(),
            });
        }
        let job = self.store().remove(id).await?;
        if let Some(artifacts) = self.orchestrator.artifacts() {
            let removed = artifacts.remove_all(id).await?;
            info!(job_id = %id, artifacts = removed, "Job deleted");
        }
        Ok(job)
    }

    /// Reads an artifact of a completed job.
    pub async fn artifact(&self, id: JobId, name: &str) -> Result<Vec<u8>, ServiceError> {
        let job = self.store().get(id).await?;
        if job.status != JobStatus::Completed {
            return Err(ServiceError::Conflict {
                job_id: id,
                status: job.status,
                message: "artifacts are only available for completed jobs".to_string(),
            });
        }
        let Some(artifacts) = self.orchestrator.artifacts() else {
            return Err(ArtifactError::NotFound {
                job_id: id,
                name: name.to_string(),
            }
            .into());
        };
        Ok(artifacts.get(id, name).await?)
    }

    /// Stops accepting jobs and waits for running ones to finish.
    ///
    /// Jobs still waiting in the queue are failed with "service shutting
    /// down". Calling it twice is harmless.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        drop(self.queue.lock().take());
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                warn!(error = %e, "Dispatcher ended abnormally");
            }
            info!("Job service stopped");
        }
    }
}
