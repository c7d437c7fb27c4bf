//! Stage trait and the fixed set of stage identities.
//!
//! Stages are the units of work of the resume pipeline. Each one reads the
//! immutable job context plus the outputs of earlier stages and produces a
//! typed [`StageOutput`].

mod error;

pub use error::{StageError, StageErrorKind};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::context::{JobContext, PipelineRun};
use crate::core::StageOutput;

/// Identity of a pipeline stage.
///
/// The declaration order is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// The resume analyzer agent.
    AnalyzeResume,
    /// The job analyzer agent.
    AnalyzeJob,
    /// The company researcher agent.
    Research,
    /// The resume writer agent.
    Optimize,
    /// The report generator agent.
    Report,
}

impl StageId {
    /// Every stage, in execution order.
    pub const ALL: [Self; 5] = [
        Self::AnalyzeResume,
        Self::AnalyzeJob,
        Self::Research,
        Self::Optimize,
        Self::Report,
    ];

    /// The stage name used in progress, errors and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeResume => "analyze_resume",
            Self::AnalyzeJob => "analyze_job",
            Self::Research => "research",
            Self::Optimize => "optimize",
            Self::Report => "report",
        }
    }

    /// The agent role behind the stage.
    #[must_use]
    pub fn agent(&self) -> &'static str {
        match self {
            Self::AnalyzeResume => "resume analyzer",
            Self::AnalyzeJob => "job analyzer",
            Self::Research => "company researcher",
            Self::Optimize => "resume writer",
            Self::Report => "report generator",
        }
    }

    /// Progress label shown while the stage runs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::AnalyzeResume => "Analyzing resume",
            Self::AnalyzeJob => "Analyzing job requirements",
            Self::Research => "Researching company",
            Self::Optimize => "Optimizing resume",
            Self::Report => "Generating report",
        }
    }

    /// Position in the execution order.
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the identity of the stage.
    fn id(&self) -> StageId;

    /// Returns the name of the stage.
    fn name(&self) -> &'static str {
        self.id().as_str()
    }

    /// Whether running the stage twice with the same inputs is safe.
    ///
    /// Non-idempotent stages are never retried.
    fn idempotent(&self) -> bool {
        true
    }

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The immutable job context
    /// * `prior` - Outputs of the stages that already completed
    async fn run(&self, ctx: &JobContext, prior: &PipelineRun) -> Result<StageOutput, StageError>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&JobContext, &PipelineRun) -> Result<StageOutput, StageError> + Send + Sync,
{
    id: StageId,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&JobContext, &PipelineRun) -> Result<StageOutput, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(id: StageId, func: F) -> Self {
        Self { id, func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&JobContext, &PipelineRun) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("id", &self.id).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&JobContext, &PipelineRun) -> Result<StageOutput, StageError> + Send + Sync,
{
    fn id(&self) -> StageId {
        self.id
    }

    async fn run(&self, ctx: &JobContext, prior: &PipelineRun) -> Result<StageOutput, StageError> {
        (self.func)(ctx, prior)
    }
}
