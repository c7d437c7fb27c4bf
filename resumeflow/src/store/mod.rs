//! Job record storage.
//!
//! The store is the single source of truth for job status. Every mutation
//! goes through [`JobStore::update`], which validates the transition and
//! applies it atomically per job.

mod memory;

pub use memory::InMemoryJobStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{Job, JobId, JobStatus, JobSummary, JobUpdate, UpdateError};

/// Errors returned by a [`JobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No job with this id.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// The requested status change is not allowed.
    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// A compare-and-set precondition did not hold, or the job is in the
    /// wrong state for the operation.
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

impl From<UpdateError> for StoreError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            UpdateError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            UpdateError::InvalidUpdate(msg) => Self::InvalidUpdate(msg),
        }
    }
}

/// Storage backend for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Creates a Queued job with a fresh id.
    async fn create(&self, summary: JobSummary) -> Job;

    /// Returns a snapshot of the job.
    async fn get(&self, id: JobId) -> Result<Job, StoreError>;

    /// Validates and applies `update`, returning the new snapshot.
    async fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, StoreError>;

    /// All jobs, oldest first.
    async fn list(&self) -> Vec<Job>;

    /// Removes a terminal job.
    async fn remove(&self, id: JobId) -> Result<Job, StoreError>;
}
