//! Sample requests, contexts and canned agent replies.

use crate::context::{JobContext, JobRequest};
use crate::core::{
    CompanyResearch, FinalReport, JobRequirements, JobSummary, ResumeAnalysis,
    ResumeOptimization, StageOutput,
};
use crate::stages::StageId;

/// Resume text used by the sample request.
pub const SAMPLE_RESUME: &str = "Jane Doe\nMachine learning engineer, 6 years.\n\
    - Built retrieval pipelines in Python and Rust\n\
    - Led a team of four shipping clinical NLP models";

/// Target used by the sample request.
pub const SAMPLE_TARGET: &str = "Senior AI Engineer, Acme Health";

/// Canned resume analyzer reply.
pub const RESUME_ANALYSIS_REPLY: &str = r#"{
    "summary": "Machine learning engineer with clinical NLP experience",
    "skills": ["Python", "Rust", "NLP"],
    "experience_highlights": ["Led a team of four"],
    "gaps": ["No cloud certification"]
}"#;

/// Canned job analyzer reply.
pub const JOB_REQUIREMENTS_REPLY: &str = r#"{
    "title": "Senior AI Engineer",
    "company": "Acme Health",
    "required_skills": ["Python", "LLMs"],
    "preferred_skills": ["Healthcare data"],
    "responsibilities": ["Ship AI features"],
    "keywords": ["RAG", "HIPAA"]
}"#;

/// Canned company researcher reply.
pub const COMPANY_RESEARCH_REPLY: &str = r#"{
    "company": "Acme Health",
    "overview": "Digital health provider",
    "culture": ["Patient first"],
    "recent_developments": ["Launched an AI triage assistant"],
    "interview_focus": ["System design"]
}"#;

/// Canned resume writer reply.
pub const RESUME_OPTIMIZATION_REPLY: &str = r##"```json
{
    "optimized_resume": "# Jane Doe\n\nSenior machine learning engineer focused on RAG for healthcare.",
    "changes": ["Reordered experience", "Added HIPAA keyword"],
    "keywords_added": ["RAG", "HIPAA"],
    "match_score": 0.82
}
```"##;

/// Canned report generator reply.
pub const REPORT_REPLY: &str = "Jane is a strong fit for the Acme Health role. \
    Emphasize the clinical NLP work in interviews.";

/// A valid request targeting "Senior AI Engineer, Acme Health".
#[must_use]
pub fn sample_request() -> JobRequest {
    JobRequest::new(SAMPLE_RESUME, SAMPLE_TARGET)
}

/// The validated form of [`sample_request`].
#[must_use]
pub fn sample_context() -> JobContext {
    match JobContext::try_from(sample_request()) {
        Ok(ctx) => ctx,
        Err(e) => unreachable!("sample request is valid: {e}"),
    }
}

/// The redacted summary stored on jobs created from [`sample_request`].
#[must_use]
pub fn sample_summary() -> JobSummary {
    sample_context().summary()
}

/// A plausible output for `stage`, consistent with the sample request.
#[must_use]
pub fn sample_output(stage: StageId) -> StageOutput {
    match stage {
        StageId::AnalyzeResume => StageOutput::AnalyzeResume(ResumeAnalysis {
            summary: "Machine learning engineer".to_string(),
            skills: vec!["Python".to_string()],
            ..ResumeAnalysis::default()
        }),
        StageId::AnalyzeJob => StageOutput::AnalyzeJob(JobRequirements {
            title: "Senior AI Engineer".to_string(),
            company: Some("Acme Health".to_string()),
            ..JobRequirements::default()
        }),
        StageId::Research => StageOutput::Research(CompanyResearch {
            company: "Acme Health".to_string(),
            overview: "Digital health provider".to_string(),
            ..CompanyResearch::default()
        }),
        StageId::Optimize => StageOutput::Optimize(ResumeOptimization {
            optimized_resume: "# Jane Doe".to_string(),
            ..ResumeOptimization::default()
        }),
        StageId::Report => StageOutput::Report(FinalReport {
            report: "# Resume Optimization Report: Senior AI Engineer, Acme Health\n\nGood fit.\n"
                .to_string(),
            optimized_resume: "# Jane Doe".to_string(),
        }),
    }
}

/// The canned model reply for the agent behind `stage`.
#[must_use]
pub fn canned_reply(stage: StageId) -> &'static str {
    match stage {
        StageId::AnalyzeResume => RESUME_ANALYSIS_REPLY,
        StageId::AnalyzeJob => JOB_REQUIREMENTS_REPLY,
        StageId::Research => COMPANY_RESEARCH_REPLY,
        StageId::Optimize => RESUME_OPTIMIZATION_REPLY,
        StageId::Report => REPORT_REPLY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::parse_structured;

    #[test]
    fn test_sample_context_company() {
        assert_eq!(sample_context().company(), Some("Acme Health"));
        assert_eq!(sample_summary().resume_chars, SAMPLE_RESUME.chars().count());
    }

    #[test]
    fn test_sample_outputs_match_stage() {
        for id in StageId::ALL {
            assert_eq!(sample_output(id).stage_id(), id);
        }
    }

    #[test]
    fn test_canned_replies_parse() {
        let _: ResumeAnalysis = parse_structured(StageId::AnalyzeResume, RESUME_ANALYSIS_REPLY).unwrap();
        let _: JobRequirements = parse_structured(StageId::AnalyzeJob, JOB_REQUIREMENTS_REPLY).unwrap();
        let _: CompanyResearch = parse_structured(StageId::Research, COMPANY_RESEARCH_REPLY).unwrap();
        let o: ResumeOptimization =
            parse_structured(StageId::Optimize, RESUME_OPTIMIZATION_REPLY).unwrap();
        assert!(o.optimized_resume.starts_with("# Jane Doe"));
    }
}
