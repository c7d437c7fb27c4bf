//! Per-job cancellation tokens.

use dashmap::DashMap;
use std::sync::Arc;

use super::CancellationToken;
use crate::core::JobId;

/// Hands out one token per job.
///
/// The service signals tokens; the orchestrator observes them.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    tokens: Arc<DashMap<JobId, Arc<CancellationToken>>>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token of `job_id`, creating it if needed.
    #[must_use]
    pub fn token(&self, job_id: JobId) -> Arc<CancellationToken> {
        self.tokens.entry(job_id).or_default().clone()
    }

    /// Cancels `job_id`. Returns true if this call performed the cancellation.
    pub fn cancel(&self, job_id: JobId, reason: impl Into<String>) -> bool {
        self.token(job_id).cancel(reason)
    }

    /// Whether `job_id` has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self, job_id: JobId) -> bool {
        self.tokens
            .get(&job_id)
            .is_some_and(|token| token.is_cancelled())
    }

    /// Drops the token of a finished job.
    pub fn release(&self, job_id: JobId) {
        self.tokens.remove(&job_id);
    }

    /// Number of tracked jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no job is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
