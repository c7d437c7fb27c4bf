//! Error types for the resumeflow crate.
//!
//! Each concern owns a narrow error enum (store, stage, provider, artifacts,
//! orchestration, service). [`ResumeflowError`] wraps all of them for callers
//! that want a single type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::agents::ProviderError;
use crate::artifacts::ArtifactError;
use crate::orchestrator::OrchestratorError;
use crate::service::ServiceError;
use crate::stages::StageError;
use crate::store::StoreError;
use crate::uploads::UploadError;

/// The main error type for resumeflow operations.
#[derive(Debug, Error)]
pub enum ResumeflowError {
    /// A submission failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A pipeline definition is invalid.
    #[error("{0}")]
    Pipeline(#[from] PipelineValidationError),

    /// The job store rejected an operation.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A pipeline stage failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// A model or fetch provider failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Artifact storage failed.
    #[error("{0}")]
    Artifact(#[from] ArtifactError),

    /// A resume upload was refused.
    #[error("{0}")]
    Upload(#[from] UploadError),

    /// The orchestrator could not drive a job.
    #[error("{0}")]
    Orchestrator(#[from] OrchestratorError),

    /// The submission service rejected a request.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a job submission is malformed.
///
/// Raised before any job is created; the caller sees it synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Invalid {field}: {message}")]
pub struct ValidationError {
    /// The offending request field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("field".to_string(), serde_json::json!(self.field));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}

/// Error raised when a pipeline definition is not the fixed stage order.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}
