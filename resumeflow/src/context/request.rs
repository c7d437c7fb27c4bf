//! Job submissions and their validated, immutable form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::JobSummary;
use crate::uploads::ResumeUploads;
use crate::errors::ValidationError;

/// Upper bound on resume text accepted by a submission.
pub const MAX_RESUME_CHARS: usize = 100_000;

/// Upper bound on the target role description.
pub const MAX_TARGET_CHARS: usize = 500;

/// Upper bound on an inline job description.
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 50_000;

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").expect("valid url regex")
});

/// A job submission as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Plain-text resume.
    #[serde(default)]
    pub resume_text: String,
    /// Target role description, e.g. "Senior AI Engineer, Acme Health".
    #[serde(default)]
    pub target: String,
    /// Inline job posting text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    /// Job posting URL to fetch when no inline description is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    /// Target company, if not part of `target`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Id of a previously uploaded resume, used instead of `resume_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_file_id: Option<String>,
}

impl JobRequest {
    /// Creates a request with the two required fields.
    #[must_use]
    pub fn new(resume_text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            resume_text: resume_text.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    /// Sets the inline job description.
    #[must_use]
    pub fn with_job_description(mut self, text: impl Into<String>) -> Self {
        self.job_description = Some(text.into());
        self
    }

    /// Sets the job posting URL.
    #[must_use]
    pub fn with_job_url(mut self, url: impl Into<String>) -> Self {
        self.job_url = Some(url.into());
        self
    }

    /// Sets the company name.
    #[must_use]
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company_name = Some(company.into());
        self
    }

    /// Refers to an uploaded resume instead of inline text.
    #[must_use]
    pub fn with_resume_file(mut self, file_id: impl Into<String>) -> Self {
        self.resume_file_id = Some(file_id.into());
        self
    }

    /// Replaces `resume_file_id` with the uploaded text it names.
    ///
    /// A request may carry inline text or a file id, not both. Requests
    /// without a file id pass through unchanged.
    pub fn resolve_upload(mut self, uploads: &ResumeUploads) -> Result<Self, ValidationError> {
        let Some(file_id) = self.resume_file_id.take().map(|id| id.trim().to_string()) else {
            return Ok(self);
        };
        if file_id.is_empty() {
            return Ok(self);
        }
        if !self.resume_text.trim().is_empty() {
            return Err(ValidationError::new(
                "resume_file_id",
                "give either resume_text or resume_file_id, not both",
            ));
        }
        let text = uploads
            .text(&file_id)
            .ok_or_else(|| ValidationError::new("resume_file_id", "no uploaded resume has this id"))?;
        self.resume_file_id = Some(file_id);
        self.resume_text = text;
        Ok(self)
    }
}

/// Validated job-level context shared read-only by every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    resume_text: String,
    target: String,
    job_description: Option<String>,
    job_url: Option<String>,
    company_name: Option<String>,
    resume_file_id: Option<String>,
}

impl JobContext {
    /// The resume text.
    #[must_use]
    pub fn resume_text(&self) -> &str {
        &self.resume_text
    }

    /// The target role description.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Inline job description, if supplied.
    #[must_use]
    pub fn job_description(&self) -> Option<&str> {
        self.job_description.as_deref()
    }

    /// Job posting URL, if supplied.
    #[must_use]
    pub fn job_url(&self) -> Option<&str> {
        self.job_url.as_deref()
    }

    /// The target company.
    ///
    /// Uses the explicit company name, otherwise whatever follows the last
    /// comma of the target ("Senior AI Engineer, Acme Health" → "Acme Health").
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        if let Some(name) = self.company_name.as_deref() {
            return Some(name);
        }
        self.target
            .rsplit_once(',')
            .map(|(_, company)| company.trim())
            .filter(|company| !company.is_empty())
    }

    /// Redacted projection stored on the job record.
    #[must_use]
    pub fn summary(&self) -> JobSummary {
        JobSummary {
            target: self.target.clone(),
            company: self.company().map(ToString::to_string),
            job_url: self.job_url.clone(),
            resume_file_id: self.resume_file_id.clone(),
            resume_chars: self.resume_text.chars().count(),
        }
    }
}

impl TryFrom<JobRequest> for JobContext {
    type Error = ValidationError;

    fn try_from(request: JobRequest) -> Result<Self, Self::Error> {
        if request.resume_file_id.is_some() && request.resume_text.trim().is_empty() {
            return Err(ValidationError::new(
                "resume_file_id",
                "uploaded resume was not resolved",
            ));
        }
        let resume_text = required(request.resume_text, "resume_text", MAX_RESUME_CHARS)?;
        let target = required(request.target, "target", MAX_TARGET_CHARS)?;
        let job_description = optional(
            request.job_description,
            "job_description",
            MAX_JOB_DESCRIPTION_CHARS,
        )?;
        let company_name = optional(request.company_name, "company_name", MAX_TARGET_CHARS)?;

        let job_url = match request.job_url.map(|u| u.trim().to_string()) {
            Some(url) if url.is_empty() => None,
            Some(url) if URL_PATTERN.is_match(&url) => Some(url),
            Some(_) => {
                return Err(ValidationError::new(
                    "job_url",
                    "must be an absolute http(s) URL",
                ))
            }
            None => None,
        };

        Ok(Self {
            resume_text,
            target,
            job_description,
            job_url,
            company_name,
            resume_file_id: request.resume_file_id,
        })
    }
}

fn required(value: String, field: &str, max_chars: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    check_length(trimmed, field, max_chars)?;
    Ok(trimmed.to_string())
}

fn optional(
    value: Option<String>,
    field: &str,
    max_chars: usize,
) -> Result<Option<String>, ValidationError> {
    match value {
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => {
            let trimmed = v.trim();
            check_length(trimmed, field, max_chars)?;
            Ok(Some(trimmed.to_string()))
        }
        None => Ok(None),
    }
}

fn check_length(value: &str, field: &str, max_chars: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
    Ok(())
}
