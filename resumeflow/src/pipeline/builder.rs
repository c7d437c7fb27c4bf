//! Pipeline builder with validation.

use std::sync::Arc;

use super::{AgentPipeline, RetryConfig, StageSpec};
use crate::errors::PipelineValidationError;
use crate::stages::{Stage, StageId};

/// Builder for creating validated pipelines.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    stages: Vec<(Arc<dyn Stage>, Option<RetryConfig>)>,
    default_retry: RetryConfig,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy of stages added without one.
    #[must_use]
    pub fn default_retry(mut self, retry: RetryConfig) -> Self {
        self.default_retry = retry;
        self
    }

    /// Appends a stage using the default retry policy.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push((stage, None));
        self
    }

    /// Appends a stage with its own retry policy.
    #[must_use]
    pub fn stage_with_retry(mut self, stage: Arc<dyn Stage>, retry: RetryConfig) -> Self {
        self.stages.push((stage, Some(retry)));
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Fails unless the stages are exactly [`StageId::ALL`], in order.
    pub fn build(self) -> Result<AgentPipeline, PipelineValidationError> {
        let ids: Vec<StageId> = self.stages.iter().map(|(s, _)| s.id()).collect();
        let names = || ids.iter().map(ToString::to_string).collect::<Vec<_>>();

        for (position, id) in ids.iter().enumerate() {
            if ids[..position].contains(id) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{id}' appears more than once"
                ))
                .with_stages(names())
                .with_fix_hint("Add each stage exactly once."));
            }
        }

        if ids != StageId::ALL {
            let missing: Vec<String> = StageId::ALL
                .iter()
                .filter(|id| !ids.contains(id))
                .map(ToString::to_string)
                .collect();
            let message = if missing.is_empty() {
                "Stages are out of order".to_string()
            } else {
                format!("Missing stages: {}", missing.join(", "))
            };
            let expected = StageId::ALL.map(|id| id.as_str()).join(" -> ");
            return Err(PipelineValidationError::new(message)
                .with_stages(names())
                .with_fix_hint(format!("Add stages in this order: {expected}")));
        }

        let default_retry = self.default_retry;
        let stages = self
            .stages
            .into_iter()
            .map(|(stage, retry)| {
                StageSpec::new(stage, retry.unwrap_or_else(|| default_retry.clone()))
            })
            .collect();
        Ok(AgentPipeline { stages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedStage;

    fn stage(id: StageId) -> Arc<dyn Stage> {
        Arc::new(ScriptedStage::new(id))
    }

    fn full() -> PipelineBuilder {
        StageId::ALL
            .into_iter()
            .fold(PipelineBuilder::new(), |b, id| b.stage(stage(id)))
    }

    #[test]
    fn test_build_full_pipeline() {
        let pipeline = full().build().unwrap();
        assert_eq!(pipeline.stage_ids(), StageId::ALL.to_vec());
    }

    #[test]
    fn test_per_stage_retry_overrides_default() {
        let pipeline = PipelineBuilder::new()
            .default_retry(RetryConfig::new().with_max_attempts(2))
            .stage(stage(StageId::AnalyzeResume))
            .stage_with_retry(stage(StageId::AnalyzeJob), RetryConfig::no_retry())
            .stage(stage(StageId::Research))
            .stage(stage(StageId::Optimize))
            .stage(stage(StageId::Report))
            .build()
            .unwrap();

        assert_eq!(pipeline.stages()[0].retry.max_attempts, 2);
        assert_eq!(pipeline.stages()[1].retry.max_attempts, 1);
    }

    #[test]
    fn test_missing_stage_rejected() {
        let err = PipelineBuilder::new()
            .stage(stage(StageId::AnalyzeResume))
            .stage(stage(StageId::AnalyzeJob))
            .build()
            .unwrap_err();
        assert!(err.message.contains("research"));
        assert!(err.fix_hint.is_some());
    }

    #[test]
    fn test_reordered_rejected() {
        let err = PipelineBuilder::new()
            .stage(stage(StageId::AnalyzeJob))
            .stage(stage(StageId::AnalyzeResume))
            .stage(stage(StageId::Research))
            .stage(stage(StageId::Optimize))
            .stage(stage(StageId::Report))
            .build()
            .unwrap_err();
        assert_eq!(err.message, "Stages are out of order");
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = full().stage(stage(StageId::Report)).build().unwrap_err();
        assert!(err.message.contains("more than once"));
    }
}
