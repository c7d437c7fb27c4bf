//! Typed outputs of the five pipeline stages.
//!
//! Every stage has an explicit schema; the agents deserialize model replies
//! into these structs, so missing list fields default to empty.

use serde::{Deserialize, Serialize};

use crate::stages::StageId;

/// What the resume analyzer learned about the candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeAnalysis {
    /// Short professional summary.
    #[serde(default)]
    pub summary: String,
    /// Skills found in the resume.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Notable achievements and roles.
    #[serde(default)]
    pub experience_highlights: Vec<String>,
    /// Weaknesses or missing information.
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Requirements extracted from the target job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequirements {
    /// Job title.
    #[serde(default)]
    pub title: String,
    /// Hiring company, if the posting names it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Must-have skills.
    #[serde(default)]
    pub required_skills: Vec<String>,
    /// Nice-to-have skills.
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    /// Main responsibilities.
    #[serde(default)]
    pub responsibilities: Vec<String>,
    /// Keywords an applicant tracking system would look for.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// What the company researcher found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyResearch {
    /// Company name.
    #[serde(default)]
    pub company: String,
    /// What the company does.
    #[serde(default)]
    pub overview: String,
    /// Values and culture notes.
    #[serde(default)]
    pub culture: Vec<String>,
    /// Recent news or initiatives.
    #[serde(default)]
    pub recent_developments: Vec<String>,
    /// Topics to prepare for interviews.
    #[serde(default)]
    pub interview_focus: Vec<String>,
}

/// The rewritten resume and what changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeOptimization {
    /// The optimized resume as markdown.
    #[serde(default)]
    pub optimized_resume: String,
    /// Summary of the edits made.
    #[serde(default)]
    pub changes: Vec<String>,
    /// Job keywords worked into the resume.
    #[serde(default)]
    pub keywords_added: Vec<String>,
    /// Fit score as reported by the model, in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
}

impl ResumeOptimization {
    /// Clamps the reported score into `[0, 1]` and drops non-finite values.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.match_score = self
            .match_score
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0));
        self
    }
}

/// The final stage output: the report plus the document it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    /// The report as markdown.
    pub report: String,
    /// The optimized resume carried forward from the optimize stage.
    pub optimized_resume: String,
}

/// Output of one stage, tagged by the stage that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "output", rename_all = "snake_case")]
pub enum StageOutput {
    /// Output of the resume analyzer.
    AnalyzeResume(ResumeAnalysis),
    /// Output of the job analyzer.
    AnalyzeJob(JobRequirements),
    /// Output of the company researcher.
    Research(CompanyResearch),
    /// Output of the resume writer.
    Optimize(ResumeOptimization),
    /// Output of the report generator.
    Report(FinalReport),
}

impl StageOutput {
    /// Returns the stage this output belongs to.
    #[must_use]
    pub fn stage_id(&self) -> StageId {
        match self {
            Self::AnalyzeResume(_) => StageId::AnalyzeResume,
            Self::AnalyzeJob(_) => StageId::AnalyzeJob,
            Self::Research(_) => StageId::Research,
            Self::Optimize(_) => StageId::Optimize,
            Self::Report(_) => StageId::Report,
        }
    }

    /// Serializes the inner value for persistence.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::AnalyzeResume(v) => serde_json::to_string_pretty(v),
            Self::AnalyzeJob(v) => serde_json::to_string_pretty(v),
            Self::Research(v) => serde_json::to_string_pretty(v),
            Self::Optimize(v) => serde_json::to_string_pretty(v),
            Self::Report(v) => serde_json::to_string_pretty(v),
        }
    }
}
