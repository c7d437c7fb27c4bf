//! The validated, ordered agent pipeline.

use std::sync::Arc;

use super::{PipelineBuilder, RetryConfig};
use crate::agents::{
    CompanyResearcher, JobAnalyzer, ModelProvider, PageFetcher, ReportGenerator, ResumeAnalyzer,
    ResumeWriter,
};
use crate::stages::{Stage, StageId};

/// A stage together with its retry policy.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The stage implementation.
    pub stage: Arc<dyn Stage>,
    /// How failures of this stage are retried.
    pub retry: RetryConfig,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(stage: Arc<dyn Stage>, retry: RetryConfig) -> Self {
        Self { stage, retry }
    }

    /// The identity of the wrapped stage.
    #[must_use]
    pub fn id(&self) -> StageId {
        self.stage.id()
    }
}

/// The five resume stages in execution order.
///
/// Only [`PipelineBuilder::build`] constructs one, so the order is always
/// [`StageId::ALL`].
#[derive(Debug, Clone)]
pub struct AgentPipeline {
    pub(super) stages: Vec<StageSpec>,
}

impl AgentPipeline {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Assembles the default resume optimizer from the five agents.
    pub fn resume_optimizer(
        provider: Arc<dyn ModelProvider>,
        fetcher: Option<Arc<dyn PageFetcher>>,
        retry: RetryConfig,
    ) -> Result<Self, crate::errors::PipelineValidationError> {
        Self::builder()
            .default_retry(retry)
            .stage(Arc::new(ResumeAnalyzer::new(provider.clone())))
            .stage(Arc::new(JobAnalyzer::new(provider.clone(), fetcher)))
            .stage(Arc::new(CompanyResearcher::new(provider.clone())))
            .stage(Arc::new(ResumeWriter::new(provider.clone())))
            .stage(Arc::new(ReportGenerator::new(provider)))
            .build()
    }

    /// Stage specifications in order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Stage identities in order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(StageSpec::id).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a built pipeline.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Progress label of stage `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<&'static str> {
        self.stages.get(index).map(|s| s.id().label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_resume_optimizer_order() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let pipeline =
            AgentPipeline::resume_optimizer(provider, None, RetryConfig::default()).unwrap();

        assert_eq!(pipeline.stage_ids(), StageId::ALL.to_vec());
        assert_eq!(pipeline.len(), 5);
        assert_eq!(pipeline.label(0), Some("Analyzing resume"));
        assert_eq!(pipeline.label(5), None);
    }
}
