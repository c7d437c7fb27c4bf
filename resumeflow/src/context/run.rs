//! Accumulated stage outputs of a single pipeline run.

use serde::{Deserialize, Serialize};

use crate::core::{
    CompanyResearch, FinalReport, JobRequirements, ResumeAnalysis, ResumeOptimization, StageOutput,
};
use crate::stages::{StageError, StageId};

/// One completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage that produced the output.
    pub stage: StageId,
    /// The typed output.
    pub output: StageOutput,
    /// Attempts it took, including the successful one.
    pub attempts: u32,
    /// Wall time across all attempts.
    pub duration_ms: u64,
}

/// Ordered, append-only record of completed stages.
///
/// Stages see it read-only; only the orchestrator appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    records: Vec<StageRecord>,
}

impl PipelineRun {
    /// Creates an empty run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the output of the next stage.
    ///
    /// # Errors
    ///
    /// Fails if `output` does not belong to the stage that comes next in
    /// [`StageId::ALL`].
    pub fn record(
        &mut self,
        output: StageOutput,
        attempts: u32,
        duration_ms: u64,
    ) -> Result<(), StageError> {
        let stage = output.stage_id();
        let expected = StageId::ALL.get(self.records.len()).copied();
        if expected != Some(stage) {
            let expected = expected.map_or("none", |s| s.as_str());
            return Err(StageError::permanent(
                stage,
                format!("stage '{stage}' recorded out of order, expected '{expected}'"),
            ));
        }
        self.records.push(StageRecord {
            stage,
            output,
            attempts,
            duration_ms,
        });
        Ok(())
    }

    /// Number of completed stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no stage has completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Completed stages, in order.
    #[must_use]
    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Output of `stage`, if it completed.
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&StageOutput> {
        self.records
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.output)
    }

    /// Resume analysis, if available.
    #[must_use]
    pub fn resume_analysis(&self) -> Option<&ResumeAnalysis> {
        match self.get(StageId::AnalyzeResume) {
            Some(StageOutput::AnalyzeResume(v)) => Some(v),
            _ => None,
        }
    }

    /// Job requirements, if available.
    #[must_use]
    pub fn job_requirements(&self) -> Option<&JobRequirements> {
        match self.get(StageId::AnalyzeJob) {
            Some(StageOutput::AnalyzeJob(v)) => Some(v),
            _ => None,
        }
    }

    /// Company research, if available.
    #[must_use]
    pub fn company_research(&self) -> Option<&CompanyResearch> {
        match self.get(StageId::Research) {
            Some(StageOutput::Research(v)) => Some(v),
            _ => None,
        }
    }

    /// Resume optimization, if available.
    #[must_use]
    pub fn optimization(&self) -> Option<&ResumeOptimization> {
        match self.get(StageId::Optimize) {
            Some(StageOutput::Optimize(v)) => Some(v),
            _ => None,
        }
    }

    /// Final report, if available.
    #[must_use]
    pub fn report(&self) -> Option<&FinalReport> {
        match self.get(StageId::Report) {
            Some(StageOutput::Report(v)) => Some(v),
            _ => None,
        }
    }

    /// Resume analysis needed by `by`.
    pub fn require_resume_analysis(&self, by: StageId) -> Result<&ResumeAnalysis, StageError> {
        self.resume_analysis()
            .ok_or_else(|| StageError::missing_input(by, StageId::AnalyzeResume))
    }

    /// Job requirements needed by `by`.
    pub fn require_job_requirements(&self, by: StageId) -> Result<&JobRequirements, StageError> {
        self.job_requirements()
            .ok_or_else(|| StageError::missing_input(by, StageId::AnalyzeJob))
    }

    /// Company research needed by `by`.
    pub fn require_company_research(&self, by: StageId) -> Result<&CompanyResearch, StageError> {
        self.company_research()
            .ok_or_else(|| StageError::missing_input(by, StageId::Research))
    }

    /// Resume optimization needed by `by`.
    pub fn require_optimization(&self, by: StageId) -> Result<&ResumeOptimization, StageError> {
        self.optimization()
            .ok_or_else(|| StageError::missing_input(by, StageId::Optimize))
    }

    /// Total attempts across completed stages.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.records.iter().map(|r| r.attempts).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageErrorKind;

    fn analysis() -> StageOutput {
        StageOutput::AnalyzeResume(ResumeAnalysis {
            summary: "ML engineer".to_string(),
            ..ResumeAnalysis::default()
        })
    }

    #[test]
    fn test_record_in_order() {
        let mut run = PipelineRun::new();
        assert!(run.is_empty());

        run.record(analysis(), 1, 10).unwrap();
        run.record(StageOutput::AnalyzeJob(JobRequirements::default()), 2, 20)
            .unwrap();

        assert_eq!(run.len(), 2);
        assert_eq!(run.total_attempts(), 3);
        assert_eq!(run.resume_analysis().unwrap().summary, "ML engineer");
        assert!(run.company_research().is_none());
    }

    #[test]
    fn test_record_out_of_order_rejected() {
        let mut run = PipelineRun::new();
        let err = run
            .record(StageOutput::Research(CompanyResearch::default()), 1, 0)
            .unwrap_err();
        assert_eq!(err.kind, StageErrorKind::Permanent);
        assert!(err.message.contains("analyze_resume"));
        assert!(run.is_empty());

        run.record(analysis(), 1, 0).unwrap();
        assert!(run.record(analysis(), 1, 0).is_err());
    }

    #[test]
    fn test_require_reports_missing_stage() {
        let run = PipelineRun::new();
        let err = run.require_optimization(StageId::Report).unwrap_err();
        assert_eq!(err.stage, StageId::Report);
        assert_eq!(err.kind, StageErrorKind::MissingInput);
        assert!(err.message.contains("optimize"));
    }
}
