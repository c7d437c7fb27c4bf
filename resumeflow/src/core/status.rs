//! Job status enum and its transition graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a job.
///
/// Transitions are monotonic: `Queued → Running → {Completed | Failed | Cancelled}`.
/// A queued job may also go straight to `Failed` (it could not be scheduled) or
/// `Cancelled`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted and waiting for a worker.
    #[default]
    Queued,
    /// A worker is driving the job through the pipeline.
    Running,
    /// Every stage completed and the result is available.
    Completed,
    /// A stage (or scheduling) failed; the error is available.
    Failed,
    /// The job was cancelled before it could finish.
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is allowed.
    ///
    /// `Running → Running` is allowed so progress can be updated in place.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Failed | Self::Cancelled),
            Self::Running => matches!(
                next,
                Self::Running | Self::Completed | Self::Failed | Self::Cancelled
            ),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}
