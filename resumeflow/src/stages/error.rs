//! Stage failure type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::StageId;
use crate::agents::{ProviderError, ProviderErrorKind};

/// How a stage failure should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// An external call failed in a way that may succeed on retry.
    Transient,
    /// Retrying will not help.
    Permanent,
    /// A prior stage output the stage depends on is absent.
    MissingInput,
    /// The job was cancelled while the stage was pending or backing off.
    Cancelled,
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
            Self::MissingInput => write!(f, "missing_input"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error raised when a stage fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stage {stage} failed: {message}")]
pub struct StageError {
    /// Stage that failed.
    pub stage: StageId,
    /// Failure classification.
    pub kind: StageErrorKind,
    /// Original error message.
    pub message: String,
}

impl StageError {
    /// Creates a new stage error.
    #[must_use]
    pub fn new(stage: StageId, kind: StageErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// A failure that may succeed on retry.
    #[must_use]
    pub fn transient(stage: StageId, message: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Transient, message)
    }

    /// A failure that retrying will not fix.
    #[must_use]
    pub fn permanent(stage: StageId, message: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Permanent, message)
    }

    /// `stage` needed the output of `needed`, which is not in the run.
    #[must_use]
    pub fn missing_input(stage: StageId, needed: StageId) -> Self {
        Self::new(
            stage,
            StageErrorKind::MissingInput,
            format!("missing output of stage '{needed}'"),
        )
    }

    /// The job was cancelled.
    #[must_use]
    pub fn cancelled(stage: StageId, reason: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Cancelled, reason)
    }

    /// Attributes a provider failure to `stage`, keeping its retry class.
    #[must_use]
    pub fn from_provider(stage: StageId, err: &ProviderError) -> Self {
        let kind = match err.kind {
            ProviderErrorKind::Transient => StageErrorKind::Transient,
            ProviderErrorKind::Permanent => StageErrorKind::Permanent,
        };
        Self::new(stage, kind, err.to_string())
    }

    /// Returns true if the failure should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == StageErrorKind::Transient
    }
}
