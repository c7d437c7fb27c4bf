//! Reference to a persisted job artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::JobId;

/// A file produced by a job, addressable by `(job_id, name)`.
///
/// Artifacts are immutable once written; the digest lets readers verify
/// they got the bytes that were stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// The owning job.
    pub job_id: JobId,
    /// File name within the job (e.g. `final_report.md`).
    pub name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
    /// When the artifact was written.
    pub created_at: DateTime<Utc>,
}

impl ArtifactRef {
    /// Describes `bytes` stored under `(job_id, name)`.
    #[must_use]
    pub fn describe(
        job_id: JobId,
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            job_id,
            name: name.into(),
            content_type: content_type.into(),
            size: bytes.len(),
            sha256: sha256_hex(bytes),
            created_at: Utc::now(),
        }
    }

    /// Returns true if `bytes` match the recorded digest.
    #[must_use]
    pub fn verify(&self, bytes: &[u8]) -> bool {
        self.size == bytes.len() && self.sha256 == sha256_hex(bytes)
    }
}

/// Guesses a content type from a file name, falling back to plain text.
#[must_use]
pub fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".md") {
        "text/markdown"
    } else if name.ends_with(".json") {
        "application/json"
    } else {
        "text/plain"
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
