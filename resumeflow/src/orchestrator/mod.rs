//! Drives one job through the agent pipeline.
//!
//! The orchestrator owns every mutation of a job after creation. It moves
//! the job `Queued → Running → {Completed | Failed | Cancelled}` with
//! compare-and-set updates, so a concurrent cancellation can never be
//! overwritten by a late progress write.

mod persist;

use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn, Instrument};

use crate::artifacts::ArtifactStore;
use crate::cancellation::{CancellationRegistry, CancellationToken};
use crate::context::{JobContext, PipelineRun};
use crate::core::{
    content_type_for, ArtifactRef, Job, JobError, JobId, JobResult, JobStatus, JobUpdate,
    Progress,
};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::{job_span, stage_span};
use crate::pipeline::{run_with_retry, AgentPipeline, RetryNotice};
use crate::stages::{StageErrorKind, StageId};
use crate::store::{JobStore, StoreError};

/// Errors the orchestrator cannot record on the job itself.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The job store refused an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The job already reached a terminal state.
    #[error("Job {job_id} is already {status}")]
    AlreadyTerminal {
        /// The job.
        job_id: JobId,
        /// Its terminal status.
        status: JobStatus,
    },
}

/// Outcome of a compare-and-set write.
enum Transition {
    Applied(Job),
    /// Someone else moved the job first; carries its current status.
    Superseded(JobStatus),
}

/// Runs jobs through an [`AgentPipeline`] and records the outcome.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    pipeline: Arc<AgentPipeline>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    events: Arc<dyn EventSink>,
    tokens: CancellationRegistry,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stages", &self.pipeline.stage_ids())
            .field("artifacts", &self.artifacts.is_some())
            .field("active_jobs", &self.tokens.len())
            .finish()
    }
}

impl Orchestrator {
    /// Creates an orchestrator without artifact storage or event sink.
    #[must_use]
    pub fn new(store: Arc<dyn JobStore>, pipeline: Arc<AgentPipeline>) -> Self {
        Self {
            store,
            pipeline,
            artifacts: None,
            events: Arc::new(NoOpEventSink),
            tokens: CancellationRegistry::new(),
        }
    }

    /// Persists the artifacts of completed jobs to `artifacts`.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Reports lifecycle events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The job store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// The artifact store, if configured.
    #[must_use]
    pub fn artifacts(&self) -> Option<&Arc<dyn ArtifactStore>> {
        self.artifacts.as_ref()
    }

    /// The pipeline jobs run through.
    #[must_use]
    pub fn pipeline(&self) -> &AgentPipeline {
        &self.pipeline
    }

    /// Number of jobs with a live cancellation token.
    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.tokens.len()
    }

    /// Drives `job_id` to a terminal state and returns it.
    ///
    /// Stage failures are recorded on the job, not returned. An error means
    /// the store itself failed; the job is then failed on a best-effort basis.
    pub async fn run(&self, job_id: JobId, ctx: &JobContext) -> Result<JobStatus, OrchestratorError> {
        let token = self.tokens.token(job_id);
        let outcome = self
            .drive(job_id, ctx, &token)
            .instrument(job_span(job_id))
            .await;
        self.tokens.release(job_id);

        if let Err(e) = &outcome {
            error!(job_id = %job_id, error = %e, "Orchestration aborted");
            if let Err(abort_err) = self.abort(job_id, &format!("internal error: {e}")).await {
                warn!(job_id = %job_id, error = %abort_err, "Could not record the failure");
            }
        }
        outcome
    }

    async fn drive(
        &self,
        job_id: JobId,
        ctx: &JobContext,
        token: &CancellationToken,
    ) -> Result<JobStatus, OrchestratorError> {
        let started = Instant::now();
        let total = self.pipeline.len();

        if token.is_cancelled() {
            let reason = token.reason().unwrap_or_default();
            let update = JobUpdate::cancelled(JobError::general(reason.clone()))
                .expecting(JobStatus::Queued);
            return Ok(match self.transition(job_id, update).await? {
                Transition::Applied(_) => {
                    self.emit(events::JOB_CANCELLED, job_id, json!({"reason": reason}));
                    JobStatus::Cancelled
                }
                Transition::Superseded(actual) => actual,
            });
        }

        let first = StageId::ALL[0];
        let update = JobUpdate::running(Progress::starting(first.as_str(), first.label(), total))
            .expecting(JobStatus::Queued);
        if let Transition::Superseded(actual) = self.transition(job_id, update).await? {
            info!(job_id = %job_id, status = %actual, "Job left the queue before it started");
            return Ok(actual);
        }
        info!(job_id = %job_id, target = ctx.target(), "Job started");
        self.emit(events::JOB_STARTED, job_id, json!({"stages": total}));

        let mut run = PipelineRun::new();
        for (index, spec) in self.pipeline.stages().iter().enumerate() {
            let stage = spec.id();
            if token.is_cancelled() {
                return self.cancel_running(job_id, Some(stage), token).await;
            }

            self.emit(
                events::STAGE_STARTED,
                job_id,
                json!({"stage": stage.as_str(), "agent": stage.agent(), "index": index}),
            );
            let on_retry = |notice: RetryNotice<'_>| {
                self.emit(
                    events::STAGE_RETRYING,
                    job_id,
                    json!({
                        "stage": stage.as_str(),
                        "attempt": notice.attempt,
                        "delay_ms": u64::try_from(notice.delay.as_millis()).unwrap_or(u64::MAX),
                        "error": notice.error.message,
                    }),
                );
            };
            let attempts = run_with_retry(
                spec.stage.as_ref(),
                ctx,
                &run,
                &spec.retry,
                token,
                on_retry,
            )
            .instrument(stage_span(job_id, stage))
            .await;

            let recorded = attempts
                .result
                .and_then(|output| run.record(output, attempts.attempts, attempts.duration_ms));
            match recorded {
                Ok(()) => {
                    self.emit(
                        events::STAGE_COMPLETED,
                        job_id,
                        json!({
                            "stage": stage.as_str(),
                            "attempts": attempts.attempts,
                            "duration_ms": attempts.duration_ms,
                        }),
                    );
                }
                Err(e) if e.kind == StageErrorKind::Cancelled => {
                    return self.cancel_running(job_id, Some(stage), token).await;
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        stage = %stage,
                        attempts = attempts.attempts,
                        error = %e.message,
                        "Stage failed"
                    );
                    self.emit(
                        events::STAGE_FAILED,
                        job_id,
                        json!({
                            "stage": stage.as_str(),
                            "kind": e.kind.to_string(),
                            "error": e.message,
                            "attempts": attempts.attempts,
                        }),
                    );
                    let error = JobError::stage(stage.as_str(), e.message, attempts.attempts);
                    return self.finish_failed(job_id, error).await;
                }
            }

            let next = self
                .pipeline
                .stages()
                .get(index + 1)
                .map(|next| (next.id().as_str(), next.id().label()));
            let update = JobUpdate::running(Progress::advanced(index + 1, next, total))
                .expecting(JobStatus::Running);
            if let Transition::Superseded(actual) = self.transition(job_id, update).await? {
                return Ok(actual);
            }
        }

        if token.is_cancelled() {
            return self.cancel_running(job_id, None, token).await;
        }

        let artifacts = match self.persist(job_id, &run).await {
            Ok(artifacts) => artifacts,
            Err(cause) => {
                warn!(job_id = %job_id, error = %cause, "Artifact persistence failed");
                return self.finish_failed(job_id, JobError::general(cause)).await;
            }
        };

        let Some(report) = run.report() else {
            let error = JobError::general("pipeline finished without a report");
            return self.finish_failed(job_id, error).await;
        };
        let result = JobResult {
            optimized_resume: report.optimized_resume.clone(),
            report: report.report.clone(),
            artifacts,
        };
        let artifact_count = result.artifacts.len();
        let update = JobUpdate::completed(result, Progress::finished(total))
            .expecting(JobStatus::Running);
        Ok(match self.transition(job_id, update).await? {
            Transition::Applied(_) => {
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(job_id = %job_id, duration_ms, "Job completed");
                self.emit(
                    events::JOB_COMPLETED,
                    job_id,
                    json!({
                        "duration_ms": duration_ms,
                        "attempts": run.total_attempts(),
                        "artifacts": artifact_count,
                    }),
                );
                JobStatus::Completed
            }
            Transition::Superseded(actual) => actual,
        })
    }

    /// Writes the run's files. Returns an empty list when no store is set.
    async fn persist(&self, job_id: JobId, run: &PipelineRun) -> Result<Vec<ArtifactRef>, String> {
        let Some(store) = &self.artifacts else {
            return Ok(Vec::new());
        };
        let files =
            persist::render(run).map_err(|e| format!("failed to serialize artifacts: {e}"))?;

        let mut refs = Vec::with_capacity(files.len());
        for (name, bytes) in files {
            match store.put(job_id, name, content_type_for(name), bytes).await {
                Ok(reference) => refs.push(reference),
                Err(e) => {
                    if let Err(cleanup) = store.remove_all(job_id).await {
                        warn!(job_id = %job_id, error = %cleanup, "Artifact cleanup failed");
                    }
                    return Err(format!("failed to store artifact '{name}': {e}"));
                }
            }
        }
        Ok(refs)
    }

    async fn cancel_running(
        &self,
        job_id: JobId,
        stage: Option<StageId>,
        token: &CancellationToken,
    ) -> Result<JobStatus, OrchestratorError> {
        let reason = token.reason().unwrap_or_else(|| "cancelled".to_string());
        let error = match stage {
            Some(stage) => JobError::stage(stage.as_str(), reason.clone(), 0),
            None => JobError::general(reason.clone()),
        };
        let update = JobUpdate::cancelled(error).expecting(JobStatus::Running);
        Ok(match self.transition(job_id, update).await? {
            Transition::Applied(_) => {
                info!(job_id = %job_id, stage = ?stage, reason = %reason, "Job cancelled");
                self.emit(
                    events::JOB_CANCELLED,
                    job_id,
                    json!({"stage": stage.map(|s| s.as_str()), "reason": reason}),
                );
                JobStatus::Cancelled
            }
            Transition::Superseded(actual) => actual,
        })
    }

    async fn finish_failed(&self, job_id: JobId, error: JobError) -> Result<JobStatus, OrchestratorError> {
        let update = JobUpdate::failed(error.clone()).expecting(JobStatus::Running);
        Ok(match self.transition(job_id, update).await? {
            Transition::Applied(_) => {
                self.emit(
                    events::JOB_FAILED,
                    job_id,
                    json!({"stage": error.stage, "error": error.cause}),
                );
                JobStatus::Failed
            }
            Transition::Superseded(actual) => actual,
        })
    }

    /// Cancels `job_id`.
    ///
    /// A queued job is moved to Cancelled immediately. A running job is
    /// signalled and stops before its next stage; the returned snapshot may
    /// still show it running.
    pub async fn cancel(&self, job_id: JobId, reason: &str) -> Result<Job, OrchestratorError> {
        let job = self.store.get(job_id).await?;
        if job.status.is_terminal() {
            return Err(OrchestratorError::AlreadyTerminal {
                job_id,
                status: job.status,
            });
        }

        self.tokens.cancel(job_id, reason);
        if job.status == JobStatus::Queued {
            let update = JobUpdate::cancelled(JobError::general(reason)).expecting(JobStatus::Queued);
            if let Transition::Applied(job) = self.transition(job_id, update).await? {
                info!(job_id = %job_id, reason, "Queued job cancelled");
                self.emit(events::JOB_CANCELLED, job_id, json!({"reason": reason}));
                return Ok(job);
            }
        }

        let job = self.store.get(job_id).await?;
        if job.status.is_terminal() {
            self.tokens.release(job_id);
        }
        Ok(job)
    }

    /// Fails a queued job that could not be scheduled.
    ///
    /// A job that already left the queue is returned unchanged.
    pub async fn reject(&self, job_id: JobId, cause: &str) -> Result<Job, OrchestratorError> {
        let update = JobUpdate::failed(JobError::general(cause)).expecting(JobStatus::Queued);
        let job = match self.transition(job_id, update).await? {
            Transition::Applied(job) => {
                warn!(job_id = %job_id, cause, "Job rejected");
                self.emit(events::JOB_FAILED, job_id, json!({"error": cause}));
                job
            }
            Transition::Superseded(_) => self.store.get(job_id).await?,
        };
        self.tokens.release(job_id);
        Ok(job)
    }

    /// Fails `job_id` from whatever non-terminal state it is in.
    ///
    /// Used when orchestration itself broke down (store failure, panicked
    /// task) so the job still reaches a terminal state.
    pub async fn abort(&self, job_id: JobId, cause: &str) -> Result<Job, OrchestratorError> {
        self.tokens.release(job_id);
        let job = self.store.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }
        let job = self
            .store
            .update(job_id, JobUpdate::failed(JobError::general(cause)))
            .await?;
        self.emit(events::JOB_FAILED, job_id, json!({"error": cause}));
        Ok(job)
    }

    async fn transition(&self, job_id: JobId, update: JobUpdate) -> Result<Transition, OrchestratorError> {
        match self.store.update(job_id, update).await {
            Ok(job) => Ok(Transition::Applied(job)),
            Err(StoreError::Conflict { actual, .. }) => Ok(Transition::Superseded(actual)),
            Err(e) => Err(e.into()),
        }
    }

    fn emit(&self, event_type: &str, job_id: JobId, mut data: serde_json::Value) {
        if let Some(fields) = data.as_object_mut() {
            fields.insert("job_id".to_string(), json!(job_id.to_string()));
        }
        self.events.try_emit(event_type, Some(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::events::CollectingEventSink;
    use crate::pipeline::RetryConfig;
    use crate::stages::Stage;
    use crate::store::InMemoryJobStore;
    use crate::testing::{sample_context, sample_summary, FailingStage, FlakyStage, ScriptedStage};
    use pretty_assertions::assert_eq;

    fn fast_retry() -> RetryConfig {
        RetryConfig::new().with_base_delay_ms(1).with_max_delay_ms(2)
    }

    fn pipeline_with(replace: Arc<dyn Stage>) -> Arc<AgentPipeline> {
        let mut builder = AgentPipeline::builder().default_retry(fast_retry());
        for id in StageId::ALL {
            builder = if id == replace.id() {
                builder.stage(replace.clone())
            } else {
                builder.stage(Arc::new(ScriptedStage::new(id)))
            };
        }
        Arc::new(builder.build().unwrap())
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        artifacts: Arc<InMemoryArtifactStore>,
        events: Arc<CollectingEventSink>,
        orchestrator: Orchestrator,
    }

    fn harness(pipeline: Arc<AgentPipeline>) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let events = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(store.clone(), pipeline)
            .with_artifacts(artifacts.clone())
            .with_events(events.clone());
        Harness {
            store,
            artifacts,
            events,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_run_completes_and_persists_artifacts() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let id = h.store.create(sample_summary()).await.id;

        let status = h.orchestrator.run(id, &sample_context()).await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let job = h.store.get(id).await.unwrap();
        let result = job.result.unwrap();
        assert!(result.report.contains("Acme Health"));
        assert_eq!(result.optimized_resume, "# Jane Doe");
        assert_eq!(result.artifacts.len(), 6);
        assert_eq!(job.progress.percent, 100);
        assert!(job.error.is_none());
        assert_eq!(h.artifacts.list(id).await.unwrap().len(), 6);
        assert_eq!(h.orchestrator.active_jobs(), 0);

        let types = h.events.types_for_job(&id.to_string());
        assert_eq!(types.first().map(String::as_str), Some(events::JOB_STARTED));
        assert_eq!(types.last().map(String::as_str), Some(events::JOB_COMPLETED));
        assert_eq!(h.events.events_of_type(events::STAGE_COMPLETED).len(), 5);
    }

    #[tokio::test]
    async fn test_failed_stage_stops_pipeline() {
        let failing = Arc::new(FailingStage::permanent(StageId::Research, "model refused"));
        let h = harness(pipeline_with(failing.clone()));
        let id = h.store.create(sample_summary()).await.id;

        let status = h.orchestrator.run(id, &sample_context()).await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let job = h.store.get(id).await.unwrap();
        let error = job.error.unwrap();
        assert_eq!(error.stage.as_deref(), Some("research"));
        assert_eq!(error.cause, "model refused");
        assert_eq!(error.attempts, 1);
        assert!(job.result.is_none());
        assert_eq!(job.progress.completed_stages, 2);
        assert!(h.artifacts.list(id).await.unwrap().is_empty());
        assert!(h.events.events_of_type(events::STAGE_STARTED).len() == 3);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_with_events() {
        let h = harness(pipeline_with(Arc::new(FlakyStage::new(StageId::Optimize, 2))));
        let id = h.store.create(sample_summary()).await.id;

        let status = h.orchestrator.run(id, &sample_context()).await.unwrap();
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(h.events.events_of_type(events::STAGE_RETRYING).len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let id = h.store.create(sample_summary()).await.id;

        let job = h.orchestrator.cancel(id, "user requested").await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);

        let status = h.orchestrator.run(id, &sample_context()).await.unwrap();
        assert_eq!(status, JobStatus::Cancelled);
        assert!(h.events.events_of_type(events::STAGE_STARTED).is_empty());
        assert_eq!(h.orchestrator.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_conflicts() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let id = h.store.create(sample_summary()).await.id;
        h.orchestrator.run(id, &sample_context()).await.unwrap();

        let err = h.orchestrator.cancel(id, "too late").await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::AlreadyTerminal {
                status: JobStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reject_only_queued() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let id = h.store.create(sample_summary()).await.id;

        let job = h.orchestrator.reject(id, "queue full").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().stage, None);

        let again = h.orchestrator.reject(id, "queue full").await.unwrap();
        assert_eq!(again.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_artifact_failure_fails_job() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let id = h.store.create(sample_summary()).await.id;
        h.artifacts
            .put(id, "final_report.md", "text/markdown", b"stale".to_vec())
            .await
            .unwrap();

        let status = h.orchestrator.run(id, &sample_context()).await.unwrap();
        assert_eq!(status, JobStatus::Failed);
        let error = h.store.get(id).await.unwrap().error.unwrap();
        assert_eq!(error.stage, None);
        assert!(error.cause.contains("final_report.md"));
    }

    #[tokio::test]
    async fn test_unknown_job_is_store_error() {
        let h = harness(pipeline_with(Arc::new(ScriptedStage::new(StageId::Report))));
        let err = h
            .orchestrator
            .run(JobId::new(), &sample_context())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Store(StoreError::NotFound(_))));
    }
}
