//! In-memory job store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::{JobStore, StoreError};
use crate::core::{Job, JobId, JobStatus, JobSummary, JobUpdate};

/// Job store backed by a concurrent map.
///
/// An update holds the shard write lock for the whole validate-and-apply,
/// so writes to one job are serialized and readers always see a complete
/// snapshot.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when no job is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, summary: JobSummary) -> Job {
        let job = Job::new(JobId::new(), summary);
        self.jobs.insert(job.id, job.clone());
        debug!(job_id = %job.id, "Job created");
        job
    }

    async fn get(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs
            .get(&id)
            .map(|job| job.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: JobId, update: JobUpdate) -> Result<Job, StoreError> {
        let mut job = self.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let from = job.status;
        job.apply(update)?;
        if from != job.status {
            debug!(job_id = %id, from = %from, to = %job.status, "Job status changed");
        }
        Ok(job.clone())
    }

    async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    async fn remove(&self, id: JobId) -> Result<Job, StoreError> {
        match self.jobs.entry(id) {
            Entry::Vacant(_) => Err(StoreError::NotFound(id)),
            Entry::Occupied(entry) if !entry.get().status.is_terminal() => {
                Err(StoreError::Conflict {
                    expected: JobStatus::Completed,
                    actual: entry.get().status,
                })
            }
            Entry::Occupied(entry) => Ok(entry.remove()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobError, JobResult, Progress};
    use crate::testing::sample_summary;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryJobStore::new();
        let job = store.create(sample_summary()).await;

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, Progress::queued());
        assert_eq!(store.get(job.id).await.unwrap(), job);
    }

    #[tokio::test]
    async fn test_get_unknown() {
        let store = InMemoryJobStore::new();
        let id = JobId::new();
        assert_eq!(store.get(id).await.unwrap_err(), StoreError::NotFound(id));
    }

    #[tokio::test]
    async fn test_update_lifecycle() {
        let store = InMemoryJobStore::new();
        let id = store.create(sample_summary()).await.id;

        let running = store
            .update(
                id,
                JobUpdate::running(Progress::starting("analyze_resume", "Analyzing resume", 5))
                    .expecting(JobStatus::Queued),
            )
            .await
            .unwrap();
        assert_eq!(running.status, JobStatus::Running);
        assert!(running.started_at.is_some());

        let result = JobResult {
            optimized_resume: "# Jane".to_string(),
            report: "# Report".to_string(),
            artifacts: Vec::new(),
        };
        let done = store
            .update(id, JobUpdate::completed(result, Progress::finished(5)))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress.percent, 100);
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_job_unchanged() {
        let store = InMemoryJobStore::new();
        let id = store.create(sample_summary()).await.id;
        store
            .update(id, JobUpdate::failed(JobError::general("queue full")))
            .await
            .unwrap();

        let err = store
            .update(id, JobUpdate::running(Progress::queued()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidTransition {
                from: JobStatus::Failed,
                to: JobStatus::Running
            }
        );
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_compare_and_set_conflict() {
        let store = InMemoryJobStore::new();
        let id = store.create(sample_summary()).await.id;
        store
            .update(id, JobUpdate::cancelled(JobError::general("user")))
            .await
            .unwrap();

        let err = store
            .update(
                id,
                JobUpdate::running(Progress::queued()).expecting(JobStatus::Queued),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_ordered_by_creation() {
        let store = InMemoryJobStore::new();
        let first = store.create(sample_summary()).await.id;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(sample_summary()).await.id;

        let ids: Vec<JobId> = store.list().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_remove_only_terminal() {
        let store = InMemoryJobStore::new();
        let id = store.create(sample_summary()).await.id;
        assert!(matches!(
            store.remove(id).await,
            Err(StoreError::Conflict { .. })
        ));

        store
            .update(id, JobUpdate::failed(JobError::general("boom")))
            .await
            .unwrap();
        assert_eq!(store.remove(id).await.unwrap().id, id);
        assert!(store.is_empty());
        assert_eq!(store.remove(id).await.unwrap_err(), StoreError::NotFound(id));
    }

    #[tokio::test]
    async fn test_concurrent_progress_updates_serialize() {
        let store = Arc::new(InMemoryJobStore::new());
        let id = store.create(sample_summary()).await.id;
        store
            .update(id, JobUpdate::running(Progress::starting("analyze_resume", "Analyzing resume", 5)))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let job = store.get(id).await.unwrap();
                    store
                        .update(id, JobUpdate::running(job.progress.clone()))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Running);
    }
}
