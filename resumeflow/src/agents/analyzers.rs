//! Agents that study the inputs: resume, job posting and company.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::prompts::{self, bullets, structured_system};
use super::{ask, parse_structured, CompletionRequest, ModelProvider, PageFetcher};
use crate::context::{JobContext, PipelineRun};
use crate::core::{CompanyResearch, JobRequirements, ResumeAnalysis, StageOutput};
use crate::stages::{Stage, StageError, StageId};

/// Reads the resume and lists strengths, skills and gaps.
pub struct ResumeAnalyzer {
    provider: Arc<dyn ModelProvider>,
}

impl ResumeAnalyzer {
    /// Creates the agent.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for ResumeAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeAnalyzer")
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[async_trait]
impl Stage for ResumeAnalyzer {
    fn id(&self) -> StageId {
        StageId::AnalyzeResume
    }

    async fn run(&self, ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let prompt = format!(
            "Analyze the following resume for a candidate applying to: {target}\n\n\
             Resume:\n{resume}",
            target = ctx.target(),
            resume = ctx.resume_text(),
        );
        let request = CompletionRequest::new(
            structured_system(prompts::RESUME_ANALYZER, prompts::RESUME_ANALYSIS_SCHEMA),
            prompt,
        )
        .expect_json();

        let reply = ask(self.provider.as_ref(), self.id(), request).await?;
        let analysis: ResumeAnalysis = parse_structured(self.id(), &reply)?;
        Ok(StageOutput::AnalyzeResume(analysis))
    }
}

/// Extracts requirements from the job posting.
///
/// Prefers the inline description, then the fetched posting, then the bare
/// target role.
pub struct JobAnalyzer {
    provider: Arc<dyn ModelProvider>,
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl JobAnalyzer {
    /// Creates the agent.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, fetcher: Option<Arc<dyn PageFetcher>>) -> Self {
        Self { provider, fetcher }
    }

    async fn posting_text(&self, ctx: &JobContext) -> Result<Option<String>, StageError> {
        if let Some(description) = ctx.job_description() {
            return Ok(Some(description.to_string()));
        }
        let (Some(url), Some(fetcher)) = (ctx.job_url(), self.fetcher.as_ref()) else {
            return Ok(None);
        };

        match fetcher.fetch_text(url).await {
            Ok(page) if page.text.is_empty() => {
                warn!(url, "Job posting has no readable text");
                Ok(None)
            }
            Ok(page) => {
                debug!(url = %page.url, chars = page.text.len(), "Using fetched job posting");
                let title = page.title.map(|t| format!("{t}\n\n")).unwrap_or_default();
                Ok(Some(format!("{title}{}", page.text)))
            }
            Err(e) if e.is_transient() => Err(StageError::from_provider(self.id(), &e)),
            Err(e) => {
                warn!(url, error = %e, "Could not fetch job posting, using target only");
                Ok(None)
            }
        }
    }
}

impl fmt::Debug for JobAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobAnalyzer")
            .field("provider", &self.provider.name())
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

#[async_trait]
impl Stage for JobAnalyzer {
    fn id(&self) -> StageId {
        StageId::AnalyzeJob
    }

    async fn run(&self, ctx: &JobContext, _prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let posting = self.posting_text(ctx).await?;
        let prompt = match posting {
            Some(text) => format!(
                "Extract the requirements of this job ({target}).\n\nPosting:\n{text}",
                target = ctx.target(),
            ),
            None => format!(
                "No posting is available. Infer the typical requirements of this role: {}",
                ctx.target()
            ),
        };
        let request = CompletionRequest::new(
            structured_system(prompts::JOB_ANALYZER, prompts::JOB_REQUIREMENTS_SCHEMA),
            prompt,
        )
        .expect_json();

        let reply = ask(self.provider.as_ref(), self.id(), request).await?;
        let mut requirements: JobRequirements = parse_structured(self.id(), &reply)?;
        if let Some(company) = ctx.company() {
            requirements.company = Some(company.to_string());
        }
        Ok(StageOutput::AnalyzeJob(requirements))
    }
}

/// Researches the hiring company.
pub struct CompanyResearcher {
    provider: Arc<dyn ModelProvider>,
}

impl CompanyResearcher {
    /// Creates the agent.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for CompanyResearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanyResearcher")
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[async_trait]
impl Stage for CompanyResearcher {
    fn id(&self) -> StageId {
        StageId::Research
    }

    async fn run(&self, ctx: &JobContext, prior: &PipelineRun) -> Result<StageOutput, StageError> {
        let requirements = prior.require_job_requirements(self.id())?;
        let company = ctx
            .company()
            .map(ToString::to_string)
            .or_else(|| requirements.company.clone())
            .filter(|c| !c.is_empty());

        let Some(company) = company else {
            debug!("No company identified, skipping research call");
            return Ok(StageOutput::Research(CompanyResearch {
                company: "Unknown".to_string(),
                overview: "The hiring company could not be identified.".to_string(),
                ..CompanyResearch::default()
            }));
        };

        let prompt = format!(
            "Research {company} for a candidate applying to the role \"{title}\".\n\n\
             Key responsibilities:\n{responsibilities}",
            title = if requirements.title.is_empty() {
                ctx.target()
            } else {
                requirements.title.as_str()
            },
            responsibilities = bullets(&requirements.responsibilities),
        );
        let request = CompletionRequest::new(
            structured_system(prompts::COMPANY_RESEARCHER, prompts::COMPANY_RESEARCH_SCHEMA),
            prompt,
        )
        .expect_json();

        let reply = ask(self.provider.as_ref(), self.id(), request).await?;
        let mut research: CompanyResearch = parse_structured(self.id(), &reply)?;
        research.company = company;
        Ok(StageOutput::Research(research))
    }
}
