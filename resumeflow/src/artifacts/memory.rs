//! In-memory artifact store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use super::{validate_name, ArtifactError, ArtifactStore};
use crate::core::{ArtifactRef, JobId};

/// Keeps artifacts in process memory. Used by tests and when no output
/// directory is configured.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    files: RwLock<HashMap<JobId, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(
        &self,
        job_id: JobId,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError> {
        validate_name(name)?;
        let mut files = self.files.write();
        let job_files = files.entry(job_id).or_default();
        if job_files.contains_key(name) {
            return Err(ArtifactError::AlreadyExists {
                job_id,
                name: name.to_string(),
            });
        }
        let reference = ArtifactRef::describe(job_id, name, content_type, &bytes);
        job_files.insert(name.to_string(), bytes);
        Ok(reference)
    }

    async fn get(&self, job_id: JobId, name: &str) -> Result<Vec<u8>, ArtifactError> {
        validate_name(name)?;
        self.files
            .read()
            .get(&job_id)
            .and_then(|files| files.get(name))
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound {
                job_id,
                name: name.to_string(),
            })
    }

    async fn list(&self, job_id: JobId) -> Result<Vec<String>, ArtifactError> {
        Ok(self
            .files
            .read()
            .get(&job_id)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_all(&self, job_id: JobId) -> Result<usize, ArtifactError> {
        Ok(self
            .files
            .write()
            .remove(&job_id)
            .map_or(0, |files| files.len()))
    }
}
