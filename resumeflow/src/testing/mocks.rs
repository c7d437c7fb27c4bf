//! Mock providers and stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::fixtures::{canned_reply, sample_output};
use crate::agents::prompts;
use crate::agents::{
    Completion, CompletionRequest, FetchedPage, ModelProvider, PageFetcher, ProviderError,
};
use crate::context::{JobContext, PipelineRun};
use crate::core::StageOutput;
use crate::stages::{Stage, StageError, StageId};

/// The system prompt role of the agent behind `stage`.
fn role_for(stage: StageId) -> &'static str {
    match stage {
        StageId::AnalyzeResume => prompts::RESUME_ANALYZER,
        StageId::AnalyzeJob => prompts::JOB_ANALYZER,
        StageId::Research => prompts::COMPANY_RESEARCHER,
        StageId::Optimize => prompts::RESUME_WRITER,
        StageId::Report => prompts::REPORT_GENERATOR,
    }
}

fn stage_of(request: &CompletionRequest) -> Option<StageId> {
    StageId::ALL
        .into_iter()
        .find(|id| request.system.starts_with(role_for(*id)))
}

#[derive(Debug)]
struct InjectedFailure {
    stage: StageId,
    error: ProviderError,
    remaining: Option<usize>,
}

/// A [`ModelProvider`] that answers from a script.
///
/// Queued replies are served first, in order. After that, providers built
/// with [`ScriptedProvider::resume_optimizer`] answer each agent with its
/// canned reply. Injected failures take precedence over both.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    route_by_stage: bool,
    failures: Mutex<Vec<InjectedFailure>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Serves `replies` in order, then fails permanently.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Answers every agent of the resume pipeline with a canned reply.
    #[must_use]
    pub fn resume_optimizer() -> Self {
        Self {
            route_by_stage: true,
            ..Self::default()
        }
    }

    /// Fails every call made by `stage`'s agent with `error`.
    #[must_use]
    pub fn failing_stage(self, stage: StageId, error: ProviderError) -> Self {
        self.failures.lock().push(InjectedFailure {
            stage,
            error,
            remaining: None,
        });
        self
    }

    /// Fails the first `times` calls made by `stage`'s agent with `error`.
    #[must_use]
    pub fn failing_stage_times(self, stage: StageId, error: ProviderError, times: usize) -> Self {
        self.failures.lock().push(InjectedFailure {
            stage,
            error,
            remaining: Some(times),
        });
        self
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made by `stage`'s agent.
    #[must_use]
    pub fn calls_for(&self, stage: StageId) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| stage_of(r) == Some(stage))
            .count()
    }

    fn injected_failure(&self, stage: Option<StageId>) -> Option<ProviderError> {
        let stage = stage?;
        let mut failures = self.failures.lock();
        let failure = failures
            .iter_mut()
            .find(|f| f.stage == stage && f.remaining != Some(0))?;
        if let Some(remaining) = failure.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(failure.error.clone())
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let stage = stage_of(&request);
        self.requests.lock().push(request);

        if let Some(error) = self.injected_failure(stage) {
            return Err(error);
        }
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(Completion::new(reply, "scripted"));
        }
        match stage {
            Some(stage) if self.route_by_stage => Ok(Completion::new(canned_reply(stage), "scripted")),
            _ => Err(ProviderError::permanent("no scripted reply left")),
        }
    }
}

/// A [`PageFetcher`] that returns a fixed page or a fixed error.
#[derive(Debug)]
pub struct StaticPageFetcher {
    result: Result<FetchedPage, ProviderError>,
    calls: AtomicUsize,
}

impl StaticPageFetcher {
    /// Always returns `page`.
    #[must_use]
    pub fn new(page: FetchedPage) -> Self {
        Self {
            result: Ok(page),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with `error`.
    #[must_use]
    pub fn failing(error: ProviderError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of fetches made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticPageFetcher {
    async fn fetch_text(&self, _url: &str) -> Result<FetchedPage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// A stage that returns a fixed output and counts its calls.
#[derive(Debug)]
pub struct ScriptedStage {
    id: StageId,
    output: StageOutput,
    calls: AtomicUsize,
}

impl ScriptedStage {
    /// Returns the sample output for `id`.
    #[must_use]
    pub fn new(id: StageId) -> Self {
        Self::with_output(sample_output(id))
    }

    /// Returns `output`, posing as the stage that owns it.
    #[must_use]
    pub fn with_output(output: StageOutput) -> Self {
        Self {
            id: output.stage_id(),
            output,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the stage ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    error: StageError,
    idempotent: bool,
    calls: AtomicUsize,
}

impl FailingStage {
    /// Fails with a retryable error.
    #[must_use]
    pub fn transient(id: StageId, message: impl Into<String>) -> Self {
        Self::new(StageError::transient(id, message))
    }

    /// Fails with a non-retryable error.
    #[must_use]
    pub fn permanent(id: StageId, message: impl Into<String>) -> Self {
        Self::new(StageError::permanent(id, message))
    }

    fn new(error: StageError) -> Self {
        Self {
            error,
            idempotent: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Marks the stage as unsafe to repeat.
    #[must_use]
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    /// Number of times the stage ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn id(&self) -> StageId {
        self.error.stage
    }

    fn idempotent(&self) -> bool {
        self.idempotent
    }

    async fn run(&self, _ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// A stage that fails transiently a fixed number of times, then succeeds.
#[derive(Debug)]
pub struct FlakyStage {
    id: StageId,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyStage {
    /// Fails the first `failures` calls.
    #[must_use]
    pub fn new(id: StageId, failures: usize) -> Self {
        Self {
            id,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the stage ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FlakyStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(StageError::transient(
                self.id,
                format!("flaky failure {}", call + 1),
            ));
        }
        Ok(sample_output(self.id))
    }
}

/// A stage that sleeps before returning its sample output.
#[derive(Debug)]
pub struct SlowStage {
    id: StageId,
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowStage {
    /// Sleeps for `delay` on every call.
    #[must_use]
    pub fn new(id: StageId, delay: Duration) -> Self {
        Self {
            id,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the stage started.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, _ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(sample_output(self.id))
    }
}
