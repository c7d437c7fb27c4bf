//! Persistence of the files a job produces.
//!
//! Artifacts are immutable: the first write of a `(job_id, name)` pair wins
//! and later writes fail with [`ArtifactError::AlreadyExists`].

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::InMemoryArtifactStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{ArtifactRef, JobId};

/// Errors returned by an [`ArtifactStore`].
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact was already written.
    #[error("Artifact '{name}' already exists for job {job_id}")]
    AlreadyExists {
        /// The owning job.
        job_id: JobId,
        /// The artifact name.
        name: String,
    },

    /// No such artifact.
    #[error("Artifact '{name}' not found for job {job_id}")]
    NotFound {
        /// The owning job.
        job_id: JobId,
        /// The artifact name.
        name: String,
    },

    /// The name is not a plain file name.
    #[error("Invalid artifact name '{0}'")]
    InvalidName(String),

    /// The backing storage failed.
    #[error("Artifact storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejects names that could escape the job's directory.
pub fn validate_name(name: &str) -> Result<(), ArtifactError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidName(name.to_string()))
    }
}

/// Storage backend for job artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores `bytes` under `(job_id, name)`.
    async fn put(
        &self,
        job_id: JobId,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError>;

    /// Reads an artifact back.
    async fn get(&self, job_id: JobId, name: &str) -> Result<Vec<u8>, ArtifactError>;

    /// Names of the artifacts of `job_id`, sorted.
    async fn list(&self, job_id: JobId) -> Result<Vec<String>, ArtifactError>;

    /// Deletes every artifact of `job_id`. Returns how many were removed.
    async fn remove_all(&self, job_id: JobId) -> Result<usize, ArtifactError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("final_report.md").is_ok());
        assert!(validate_name("job_analysis.json").is_ok());

        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(validate_name(bad), Err(ArtifactError::InvalidName(_))),
                "{bad} should be rejected"
            );
        }
    }
}
