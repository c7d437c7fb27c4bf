//! Agents that produce documents: the optimized resume and the final report.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::prompts::{self, bullets, structured_system};
use super::{ask, parse_structured, CompletionRequest, ModelProvider};
use crate::context::{JobContext, PipelineRun};
use crate::core::{FinalReport, ResumeOptimization, StageOutput};
use crate::stages::{Stage, StageError, StageId};

/// Rewrites the resume for the target job.
pub struct ResumeWriter {
    provider: Arc<dyn ModelProvider>,
}

impl ResumeWriter {
    /// Creates the agent.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ResumeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeWriter")
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[async_trait]
impl Stage for ResumeWriter {
    fn id(&self) -> StageId {
        StageId::Optimize
    }

    async fn run(&self, ctx: &JobContext, prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let analysis = prior.require_resume_analysis(self.id())?;
        let requirements = prior.require_job_requirements(self.id())?;
        let culture = prior
            .company_research()
            .map(|r| bullets(&r.culture))
            .unwrap_or_else(|| bullets(&[]));

        let prompt = format!(
            "Rewrite the resume below for the role: {target}\n\n\
             Candidate strengths:\n{skills}\n\n\
             Gaps to address:\n{gaps}\n\n\
             Required skills:\n{required}\n\n\
             Keywords to include where truthful:\n{keywords}\n\n\
             Company culture:\n{culture}\n\n\
             Resume:\n{resume}",
            target = ctx.target(),
            skills = bullets(&analysis.skills),
            gaps = bullets(&analysis.gaps),
            required = bullets(&requirements.required_skills),
            keywords = bullets(&requirements.keywords),
            resume = ctx.resume_text(),
        );
        let request = CompletionRequest::new(
            structured_system(prompts::RESUME_WRITER, prompts::RESUME_OPTIMIZATION_SCHEMA),
            prompt,
        )
        .expect_json();

        let reply = ask(self.provider.as_ref(), self.id(), request).await?;
        let optimization: ResumeOptimization = parse_structured(self.id(), &reply)?;
        if optimization.optimized_resume.trim().is_empty() {
            return Err(StageError::permanent(
                self.id(),
                "model produced an empty resume",
            ));
        }
        Ok(StageOutput::Optimize(optimization.normalized()))
    }
}

/// Writes the markdown report that accompanies the optimized resume.
pub struct ReportGenerator {
    provider: Arc<dyn ModelProvider>,
}

impl ReportGenerator {
    /// Creates the agent.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ReportGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportGenerator")
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Heading naming the target role and, when not already part of it, the company.
fn report_heading(ctx: &JobContext) -> String {
    match ctx.company() {
        Some(company) if !ctx.target().contains(company) => {
            format!("# Resume Optimization Report: {} at {company}", ctx.target())
        }
        _ => format!("# Resume Optimization Report: {}", ctx.target()),
    }
}

#[async_trait]
impl Stage for ReportGenerator {
    fn id(&self) -> StageId {
        StageId::Report
    }

    async fn run(&self, ctx: &JobContext, prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let optimization = prior.require_optimization(self.id())?;
        let analysis = prior.require_resume_analysis(self.id())?;
        let requirements = prior.require_job_requirements(self.id())?;
        let research = prior.company_research();

        let score = optimization
            .match_score
            .map_or_else(|| "not scored".to_string(), |s| format!("{:.0}%", s * 100.0));
        let prompt = format!(
            "Write a report for a candidate applying to {target}. Do not add a top-level heading.\n\n\
             Include: a summary of the candidate, how the resume was changed, \
             remaining gaps, and interview preparation tips.\n\n\
             Candidate summary: {summary}\n\
             Match score: {score}\n\n\
             Changes made:\n{changes}\n\n\
             Keywords added:\n{keywords}\n\n\
             Gaps:\n{gaps}\n\n\
             Required skills:\n{required}\n\n\
             Company overview: {overview}\n\
             Interview focus:\n{focus}",
            target = ctx.target(),
            summary = analysis.summary,
            changes = bullets(&optimization.changes),
            keywords = bullets(&optimization.keywords_added),
            gaps = bullets(&analysis.gaps),
            required = bullets(&requirements.required_skills),
            overview = research.map_or("", |r| r.overview.as_str()),
            focus = bullets(
                research
                    .map(|r| r.interview_focus.as_slice())
                    .unwrap_or_default()
            ),
        );
        let request = CompletionRequest::new(prompts::REPORT_GENERATOR, prompt);

        let narrative = ask(self.provider.as_ref(), self.id(), request).await?;
        let narrative = narrative.trim();
        if narrative.is_empty() {
            return Err(StageError::transient(self.id(), "model produced an empty report"));
        }

        Ok(StageOutput::Report(FinalReport {
            report: format!("{}\n\n{narrative}\n", report_heading(ctx)),
            optimized_resume: optimization.optimized_resume.clone(),
        }))
    }
}
