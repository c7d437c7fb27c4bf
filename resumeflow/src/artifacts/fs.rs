//! Filesystem artifact store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{validate_name, ArtifactError, ArtifactStore};
use crate::core::{ArtifactRef, JobId};

/// Writes artifacts to `<root>/run-<job_id>/<name>`.
///
/// Files are opened with `create_new`, so an existing artifact is never
/// overwritten.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the artifacts of `job_id`.
    #[must_use]
    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(format!("run-{job_id}"))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        job_id: JobId,
        name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactRef, ArtifactError> {
        validate_name(name)?;
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(name);
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ArtifactError::AlreadyExists {
                    job_id,
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        debug!(job_id = %job_id, name, size = bytes.len(), "Artifact written");
        Ok(ArtifactRef::describe(job_id, name, content_type, &bytes))
    }

    async fn get(&self, job_id: JobId, name: &str) -> Result<Vec<u8>, ArtifactError> {
        validate_name(name)?;
        match tokio::fs::read(self.job_dir(job_id).join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ArtifactError::NotFound {
                job_id,
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, job_id: JobId) -> Result<Vec<String>, ArtifactError> {
        let mut entries = match tokio::fs::read_dir(self.job_dir(job_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove_all(&self, job_id: JobId) -> Result<usize, ArtifactError> {
        let count = self.list(job_id).await?.len();
        match tokio::fs::remove_dir_all(self.job_dir(job_id)).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_layout_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let id = JobId::new();

        let reference = store
            .put(id, "optimized_resume.md", "text/markdown", b"# Jane".to_vec())
            .await
            .unwrap();

        let expected = dir.path().join(format!("run-{id}")).join("optimized_resume.md");
        assert!(expected.exists());
        assert_eq!(std::fs::read(&expected).unwrap(), b"# Jane");
        assert!(reference.verify(&store.get(id, "optimized_resume.md").await.unwrap()));
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let id = JobId::new();

        store.put(id, "a.md", "text/markdown", b"one".to_vec()).await.unwrap();
        let err = store
            .put(id, "a.md", "text/markdown", b"two".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyExists { .. }));
        assert_eq!(store.get(id, "a.md").await.unwrap(), b"one".to_vec());
    }

    #[tokio::test]
    async fn test_list_and_remove_all() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let id = JobId::new();
        assert!(store.list(id).await.unwrap().is_empty());

        store.put(id, "b.json", "application/json", b"{}".to_vec()).await.unwrap();
        store.put(id, "a.md", "text/markdown", b"#".to_vec()).await.unwrap();
        assert_eq!(store.list(id).await.unwrap(), vec!["a.md", "b.json"]);

        assert_eq!(store.remove_all(id).await.unwrap(), 2);
        assert!(!store.job_dir(id).exists());
        assert_eq!(store.remove_all(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let err = store
            .put(JobId::new(), "../escape.md", "text/markdown", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidName(_)));
    }
}
