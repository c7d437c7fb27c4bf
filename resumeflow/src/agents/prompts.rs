//! Prompt text for the five agents.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY: &str = "You MUST respond with a single valid JSON object. \
    Do not include any text outside the JSON object. \
    Do not use markdown code fences.";

/// Resume analyzer role.
pub const RESUME_ANALYZER: &str = "You are an expert resume analyst. \
    You read resumes carefully and identify the candidate's strengths, skills \
    and the gaps a hiring manager would notice.";

/// Job analyzer role.
pub const JOB_ANALYZER: &str = "You are a job requirements analyst. \
    You extract the hard and soft requirements from job postings, including the \
    keywords an applicant tracking system screens for.";

/// Company researcher role.
pub const COMPANY_RESEARCHER: &str = "You are a company research specialist. \
    You summarize what a company does, its culture and recent developments, and \
    what candidates should prepare for in interviews.";

/// Resume writer role.
pub const RESUME_WRITER: &str = "You are a professional resume writer. \
    You rewrite resumes to match a target job without inventing experience the \
    candidate does not have.";

/// Report generator role.
pub const REPORT_GENERATOR: &str = "You are a career coach writing a concise report \
    in markdown for a job candidate.";

/// Schema reminder for the resume analysis.
pub const RESUME_ANALYSIS_SCHEMA: &str = r#"{"summary": string, "skills": [string], "experience_highlights": [string], "gaps": [string]}"#;

/// Schema reminder for job requirements.
pub const JOB_REQUIREMENTS_SCHEMA: &str = r#"{"title": string, "company": string|null, "required_skills": [string], "preferred_skills": [string], "responsibilities": [string], "keywords": [string]}"#;

/// Schema reminder for company research.
pub const COMPANY_RESEARCH_SCHEMA: &str = r#"{"company": string, "overview": string, "culture": [string], "recent_developments": [string], "interview_focus": [string]}"#;

/// Schema reminder for the resume optimization.
pub const RESUME_OPTIMIZATION_SCHEMA: &str = r#"{"optimized_resume": string (markdown), "changes": [string], "keywords_added": [string], "match_score": number between 0 and 1}"#;

/// Builds a system prompt for a structured stage.
#[must_use]
pub fn structured_system(role: &str, schema: &str) -> String {
    format!("{role}\n\n{JSON_ONLY}\nSchema: {schema}")
}

/// Renders a list as markdown bullets, or a placeholder when empty.
#[must_use]
pub fn bullets(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
