//! The job record and the update type that is the only way to change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::{ArtifactRef, JobStatus};

/// Opaque unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Human-readable progress of a job through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Name of the stage currently running (or about to run).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Description shown to users.
    pub label: String,
    /// Number of stages that have completed.
    pub completed_stages: usize,
    /// Number of stages in the pipeline.
    pub total_stages: usize,
    /// `completed_stages / total_stages` as a percentage.
    pub percent: u8,
}

impl Progress {
    /// Progress of a job that has not started.
    #[must_use]
    pub fn queued() -> Self {
        Self {
            stage: None,
            label: "Queued".to_string(),
            completed_stages: 0,
            total_stages: 0,
            percent: 0,
        }
    }

    /// Progress of a job about to run its first stage.
    #[must_use]
    pub fn starting(stage: impl Into<String>, label: impl Into<String>, total: usize) -> Self {
        Self {
            stage: Some(stage.into()),
            label: label.into(),
            completed_stages: 0,
            total_stages: total,
            percent: 0,
        }
    }

    /// Progress after `completed` stages, pointing at the next stage if any.
    #[must_use]
    pub fn advanced(completed: usize, next: Option<(&str, &str)>, total: usize) -> Self {
        let (stage, label) = match next {
            Some((stage, label)) => (Some(stage.to_string()), label.to_string()),
            None => (None, "Finalizing results".to_string()),
        };
        Self {
            stage,
            label,
            completed_stages: completed,
            total_stages: total,
            percent: percent_of(completed, total),
        }
    }

    /// Progress of a job whose pipeline finished.
    #[must_use]
    pub fn finished(total: usize) -> Self {
        Self {
            stage: None,
            label: "Optimization completed".to_string(),
            completed_stages: total,
            total_stages: total,
            percent: 100,
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::queued()
    }
}

fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from(completed.min(total) * 100 / total).unwrap_or(100)
}

/// Why a job did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// The failing stage, when the failure came from the pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Human-readable cause.
    pub cause: String,
    /// Attempts made by the failing stage.
    #[serde(default)]
    pub attempts: u32,
}

impl JobError {
    /// Error attributed to a pipeline stage.
    #[must_use]
    pub fn stage(stage: impl Into<String>, cause: impl Into<String>, attempts: u32) -> Self {
        Self {
            stage: Some(stage.into()),
            cause: cause.into(),
            attempts,
        }
    }

    /// Error not attributable to any stage (scheduling, storage).
    #[must_use]
    pub fn general(cause: impl Into<String>) -> Self {
        Self {
            stage: None,
            cause: cause.into(),
            attempts: 0,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "stage '{}' failed: {}", stage, self.cause),
            None => write!(f, "{}", self.cause),
        }
    }
}

/// The retained output of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// The optimized resume document (markdown).
    pub optimized_resume: String,
    /// The generated report (markdown).
    pub report: String,
    /// Persisted artifacts, if an artifact store is configured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
}

/// Redacted projection of the submission kept on the job record.
///
/// The resume text itself is never stored on the job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Target role description.
    pub target: String,
    /// Target company, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Job posting URL, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    /// Uploaded resume the text came from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_file_id: Option<String>,
    /// Length of the submitted resume in characters.
    pub resume_chars: usize,
}

/// One job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The job identifier.
    pub id: JobId,
    /// Current status.
    pub status: JobStatus,
    /// Current progress.
    pub progress: Progress,
    /// Result, present only when completed.
    pub result: Option<JobResult>,
    /// Error, present only when failed or cancelled.
    pub error: Option<JobError>,
    /// What was submitted.
    pub request: JobSummary,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When a worker started the job.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a queued job.
    #[must_use]
    pub fn new(id: JobId, request: JobSummary) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: Progress::queued(),
            result: None,
            error: None,
            request,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Validates `update` against the current record and applies it.
    ///
    /// Nothing is changed when an error is returned.
    pub fn apply(&mut self, update: JobUpdate) -> Result<(), UpdateError> {
        if let Some(expected) = update.expect {
            if expected != self.status {
                return Err(UpdateError::Conflict {
                    expected,
                    actual: self.status,
                });
            }
        }

        if !self.status.can_transition_to(update.status) {
            return Err(UpdateError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }

        match update.status {
            JobStatus::Completed if update.result.is_none() => {
                return Err(UpdateError::InvalidUpdate(
                    "a completed job requires a result".to_string(),
                ));
            }
            JobStatus::Failed if update.error.is_none() => {
                return Err(UpdateError::InvalidUpdate(
                    "a failed job requires an error".to_string(),
                ));
            }
            _ => {}
        }
        if update.result.is_some() && update.status != JobStatus::Completed {
            return Err(UpdateError::InvalidUpdate(format!(
                "result is only allowed on completed jobs, not {}",
                update.status
            )));
        }
        if update.error.is_some()
            && !matches!(update.status, JobStatus::Failed | JobStatus::Cancelled)
        {
            return Err(UpdateError::InvalidUpdate(format!(
                "error is only allowed on failed or cancelled jobs, not {}",
                update.status
            )));
        }

        if let Some(progress) = &update.progress {
            if progress.completed_stages < self.progress.completed_stages {
                return Err(UpdateError::InvalidUpdate(format!(
                    "progress regressed from {} to {} completed stages",
                    self.progress.completed_stages, progress.completed_stages
                )));
            }
        }

        let now = Utc::now();
        if update.status == JobStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if update.status.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        self.result = update.result;
        self.error = update.error;
        Ok(())
    }
}

/// A requested change to a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    /// The status to move to.
    pub status: JobStatus,
    /// New progress, if it changed.
    pub progress: Option<Progress>,
    /// Result (completed jobs only).
    pub result: Option<JobResult>,
    /// Error (failed or cancelled jobs only).
    pub error: Option<JobError>,
    /// Apply only if the job currently has this status.
    pub expect: Option<JobStatus>,
}

impl JobUpdate {
    /// Creates an update to `status`.
    #[must_use]
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            result: None,
            error: None,
            expect: None,
        }
    }

    /// Moves the job to Running with the given progress.
    #[must_use]
    pub fn running(progress: Progress) -> Self {
        Self::new(JobStatus::Running).with_progress(progress)
    }

    /// Completes the job with a result.
    #[must_use]
    pub fn completed(result: JobResult, progress: Progress) -> Self {
        Self::new(JobStatus::Completed)
            .with_progress(progress)
            .with_result(result)
    }

    /// Fails the job with an error.
    #[must_use]
    pub fn failed(error: JobError) -> Self {
        Self::new(JobStatus::Failed).with_error(error)
    }

    /// Cancels the job with an error describing where it stopped.
    #[must_use]
    pub fn cancelled(error: JobError) -> Self {
        Self::new(JobStatus::Cancelled).with_error(error)
    }

    /// Sets the progress.
    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets the result.
    #[must_use]
    pub fn with_result(mut self, result: JobResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: JobError) -> Self {
        self.error = Some(error);
        self
    }

    /// Only apply if the job currently has `status`.
    #[must_use]
    pub fn expecting(mut self, status: JobStatus) -> Self {
        self.expect = Some(status);
        self
    }
}

/// Reasons a [`JobUpdate`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    /// The status change would go backwards or leave a terminal state.
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// The compare-and-set precondition did not hold.
    #[error("Job status conflict: expected {expected}, found {actual}")]
    Conflict {
        /// Status the caller expected.
        expected: JobStatus,
        /// Status the job actually had.
        actual: JobStatus,
    },

    /// The update breaks a field invariant.
    #[error("Invalid job update: {0}")]
    InvalidUpdate(String),
}
