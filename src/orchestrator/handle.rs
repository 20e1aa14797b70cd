//! Handles to submitted jobs.

use crate::core::{AnalysisJob, JobError, JobStatus};

use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A handle to a job running in the background.
///
/// Handles are cheap to clone. Every clone observes the same job snapshot,
/// which is only ever replaced as a whole, so readers never see a partially
/// applied unit update.
#[derive(Debug, Clone)]
pub struct JobHandle {
    /// Unique identifier of the job.
    pub id: String,
    /// Live snapshot shared with the orchestrator.
    snapshot: Arc<RwLock<AnalysisJob>>,
    /// Cancels the job.
    cancel: CancellationToken,
    /// Receives the final outcome.
    outcome: watch::Receiver<Option<Result<AnalysisJob, JobError>>>,
}

impl JobHandle {
    pub(crate) fn new(
        snapshot: Arc<RwLock<AnalysisJob>>,
        cancel: CancellationToken,
        outcome: watch::Receiver<Option<Result<AnalysisJob, JobError>>>,
    ) -> Self {
        let id = snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .id
            .clone();
        Self {
            id,
            snapshot,
            cancel,
            outcome,
        }
    }

    /// Returns a copy of the job as it is now.
    pub fn snapshot(&self) -> AnalysisJob {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the current job status.
    pub fn status(&self) -> JobStatus {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .status
    }

    /// Returns true if the job reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.status().is_terminal()
    }

    /// Requests cancellation. The job still finalizes, as `Failed`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for the job to finish and returns its final state.
    pub async fn wait(mut self) -> Result<AnalysisJob, JobError> {
        match self.outcome.wait_for(Option::is_some).await {
            Ok(outcome) => match &*outcome {
                Some(result) => result.clone(),
                None => Err(JobError::internal("job outcome missing")),
            },
            Err(_) => Err(JobError::internal(format!(
                "job {} stopped without reporting an outcome",
                self.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Subject;

    fn handle() -> (
        JobHandle,
        watch::Sender<Option<Result<AnalysisJob, JobError>>>,
    ) {
        let job = AnalysisJob::new(Subject::new("acme.com").unwrap(), ["seo"]);
        let (tx, rx) = watch::channel(None);
        let handle = JobHandle::new(
            Arc::new(RwLock::new(job)),
            CancellationToken::new(),
            rx,
        );
        (handle, tx)
    }

    #[test]
    fn test_job_handle() {
        let (handle, _tx) = handle();
        assert_eq!(handle.status(), JobStatus::Pending);
        assert!(!handle.is_complete());
        assert_eq!(handle.snapshot().id, handle.id);

        handle.clone().cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_returns_outcome() {
        let (handle, tx) = handle();
        let job = handle.snapshot();
        tx.send(Some(Ok(job.clone()))).unwrap();
        assert_eq!(handle.wait().await.unwrap().id, job.id);
    }

    #[tokio::test]
    async fn test_wait_without_outcome() {
        let (handle, tx) = handle();
        drop(tx);
        assert!(matches!(handle.wait().await, Err(JobError::Internal { .. })));
    }
}
