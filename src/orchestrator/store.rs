//! Job persistence collaborator.

use crate::core::{AnalysisJob, JobError, JobStatus, UnitResult, UnitStatus};

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;

/// Trait for job persistence implementations.
///
/// The orchestrator only calls these operations; storage schema is the
/// implementation's concern. Any error returned here is treated as an
/// infrastructure defect and surfaced to the orchestrator's caller.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use brandscope::core::{AnalysisJob, JobError, JobStatus, UnitResult, UnitStatus};
/// use brandscope::orchestrator::JobStore;
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct PostgresJobStore {
///     // Connection pool
/// }
///
/// #[async_trait]
/// impl JobStore for PostgresJobStore {
///     async fn create(&self, job: &AnalysisJob) -> Result<(), JobError> {
///         // INSERT INTO analysis_jobs ...
///         todo!()
///     }
///
///     async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobError> {
///         todo!()
///     }
///
///     async fn update_progress(
///         &self,
///         job_id: &str,
///         unit: &str,
///         status: UnitStatus,
///         result: Option<&UnitResult>,
///     ) -> Result<(), JobError> {
///         todo!()
///     }
///
///     async fn finalize(
///         &self,
///         job_id: &str,
///         status: JobStatus,
///         composite_score: Option<f64>,
///         error_message: Option<&str>,
///     ) -> Result<(), JobError> {
///         todo!()
///     }
///
///     async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, JobError> {
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait JobStore: Send + Sync + Debug {
    /// Persists a newly created job.
    async fn create(&self, job: &AnalysisJob) -> Result<(), JobError>;

    /// Persists a job status change.
    async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobError>;

    /// Persists one unit's progress and, for terminal statuses, its result.
    async fn update_progress(
        &self,
        job_id: &str,
        unit: &str,
        status: UnitStatus,
        result: Option<&UnitResult>,
    ) -> Result<(), JobError>;

    /// Persists the terminal status and aggregate of a job.
    async fn finalize(
        &self,
        job_id: &str,
        status: JobStatus,
        composite_score: Option<f64>,
        error_message: Option<&str>,
    ) -> Result<(), JobError>;

    /// Loads a job.
    async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, JobError>;
}

/// A job store that keeps jobs in memory.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, AnalysisJob>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if no job is stored.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns the IDs of every stored job, sorted.
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    fn with_job<T>(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut AnalysisJob) -> Result<T, JobError>,
    ) -> Result<T, JobError> {
        let mut job = self.jobs.get_mut(job_id).ok_or_else(|| JobError::NotFound {
            job_id: job_id.to_string(),
        })?;
        apply(job.value_mut())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &AnalysisJob) -> Result<(), JobError> {
        if self.jobs.contains_key(&job.id) {
            return Err(JobError::persistence(&job.id, "job already exists"));
        }
        self.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), JobError> {
        self.with_job(job_id, |job| job.transition_to(status))
    }

    async fn update_progress(
        &self,
        job_id: &str,
        unit: &str,
        status: UnitStatus,
        result: Option<&UnitResult>,
    ) -> Result<(), JobError> {
        self.with_job(job_id, |job| match result {
            Some(result) => job.record_unit(unit, result.clone()).map(|_| ()),
            None if status == UnitStatus::Running => job.mark_running(unit),
            None => Ok(()),
        })
    }

    async fn finalize(
        &self,
        job_id: &str,
        status: JobStatus,
        composite_score: Option<f64>,
        error_message: Option<&str>,
    ) -> Result<(), JobError> {
        self.with_job(job_id, |job| {
            job.finalize(status, composite_score, error_message.map(str::to_string))
        })
    }

    async fn get(&self, job_id: &str) -> Result<Option<AnalysisJob>, JobError> {
        Ok(self.jobs.get(job_id).map(|job| job.value().clone()))
    }
}

/// A job store that persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpJobStore;

#[async_trait]
impl JobStore for NoOpJobStore {
    async fn create(&self, _job: &AnalysisJob) -> Result<(), JobError> {
        Ok(())
    }

    async fn update_status(&self, _job_id: &str, _status: JobStatus) -> Result<(), JobError> {
        Ok(())
    }

    async fn update_progress(
        &self,
        _job_id: &str,
        _unit: &str,
        _status: UnitStatus,
        _result: Option<&UnitResult>,
    ) -> Result<(), JobError> {
        Ok(())
    }

    async fn finalize(
        &self,
        _job_id: &str,
        _status: JobStatus,
        _composite_score: Option<f64>,
        _error_message: Option<&str>,
    ) -> Result<(), JobError> {
        Ok(())
    }

    async fn get(&self, _job_id: &str) -> Result<Option<AnalysisJob>, JobError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Subject, UnitError, UnitOutput};

    fn job() -> AnalysisJob {
        AnalysisJob::new(Subject::new("acme.com").unwrap(), ["seo", "social"])
    }

    #[tokio::test]
    async fn test_in_memory_lifecycle() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();
        assert!(store.create(&job).await.is_err());

        store
            .update_status(&job.id, JobStatus::Processing)
            .await
            .unwrap();
        store
            .update_progress(&job.id, "seo", UnitStatus::Running, None)
            .await
            .unwrap();
        let success = UnitResult::success(UnitOutput::scored(50.0));
        store
            .update_progress(&job.id, "seo", UnitStatus::Succeeded, Some(&success))
            .await
            .unwrap();
        let failure = UnitResult::failure(UnitError::new("social", "quota"));
        store
            .update_progress(&job.id, "social", UnitStatus::Failed, Some(&failure))
            .await
            .unwrap();
        store
            .finalize(&job.id, JobStatus::Completed, Some(50.0), Some("social: quota"))
            .await
            .unwrap();

        let stored = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.composite_score, Some(50.0));
        assert_eq!(stored.partial_results.len(), 2);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = InMemoryJobStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(matches!(
            store.update_status("missing", JobStatus::Processing).await,
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_status_cannot_regress() {
        let store = InMemoryJobStore::new();
        let job = job();
        store.create(&job).await.unwrap();
        store
            .update_status(&job.id, JobStatus::Processing)
            .await
            .unwrap();
        assert!(store
            .update_status(&job.id, JobStatus::Pending)
            .await
            .is_err());
    }
}
