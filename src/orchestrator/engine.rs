//! The analysis orchestrator implementation.

use crate::audit::{self, UnitAuditEvent};
use crate::core::{
    AnalysisJob, Analyzer, ArcAnalyzer, JobError, JobStatus, Subject, UnitError,
    UnitFailureKind, UnitResult, UnitStatus,
};
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::handle::JobHandle;
use crate::orchestrator::score::composite_score;
use crate::orchestrator::store::{InMemoryJobStore, JobStore};

use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Builder for creating an `AnalysisOrchestrator`.
pub struct AnalysisOrchestratorBuilder {
    analyzers: Vec<ArcAnalyzer>,
    store: Option<Arc<dyn JobStore>>,
    config: OrchestratorConfig,
}

impl AnalysisOrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
            store: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Adds an analyzer unit.
    pub fn add_analyzer<A: Analyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzers.push(Arc::new(analyzer));
        self
    }

    /// Adds an analyzer unit wrapped in an Arc.
    pub fn add_arc_analyzer(mut self, analyzer: ArcAnalyzer) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    /// Sets the job store. Defaults to an [`InMemoryJobStore`].
    pub fn with_store<S: JobStore + 'static>(self, store: S) -> Self {
        self.with_arc_store(Arc::new(store))
    }

    /// Sets a job store wrapped in an Arc.
    pub fn with_arc_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Result<AnalysisOrchestrator, JobError> {
        if self.analyzers.is_empty() {
            return Err(JobError::configuration("At least one analyzer is required"));
        }

        let mut names = HashSet::new();
        for analyzer in &self.analyzers {
            if !names.insert(analyzer.name()) {
                return Err(JobError::configuration(format!(
                    "Duplicate analyzer name '{}'",
                    analyzer.name()
                )));
            }
        }

        if self.config.min_successes == 0 || self.config.min_successes > self.analyzers.len() {
            return Err(JobError::configuration(format!(
                "min_successes must be between 1 and {}, got {}",
                self.analyzers.len(),
                self.config.min_successes
            )));
        }

        Ok(AnalysisOrchestrator {
            analyzers: self.analyzers,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryJobStore::new())),
            config: self.config,
            active: DashMap::new(),
        })
    }
}

impl Default for AnalysisOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A job that has not finalized yet.
struct ActiveJob {
    snapshot: Arc<RwLock<AnalysisJob>>,
    cancel: CancellationToken,
}

/// Clears a job from the active map when its driver ends, and finalizes
/// the job if the driver was dropped mid-flight.
struct DriveGuard<'a> {
    orchestrator: &'a AnalysisOrchestrator,
    snapshot: &'a Arc<RwLock<AnalysisJob>>,
    job_id: &'a str,
    cancel: &'a CancellationToken,
    finished: bool,
}

impl Drop for DriveGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.active.remove(self.job_id);
        if !self.finished {
            self.cancel.cancel();
            self.orchestrator.abandon(self.snapshot, self.job_id);
        }
    }
}

/// Why a job stopped before every unit reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    Cancelled,
    TimedOut,
    Unreachable,
}

/// Runs analyzer units for a subject and aggregates their results.
pub struct AnalysisOrchestrator {
    /// Registered analyzer units.
    analyzers: Vec<ArcAnalyzer>,
    /// Persistence collaborator.
    store: Arc<dyn JobStore>,
    /// Configuration.
    config: OrchestratorConfig,
    /// Jobs in flight, keyed by ID.
    active: DashMap<String, ActiveJob>,
}

impl AnalysisOrchestrator {
    /// Creates a new builder.
    pub fn builder() -> AnalysisOrchestratorBuilder {
        AnalysisOrchestratorBuilder::new()
    }

    /// Runs a job to completion.
    ///
    /// Unit failures never produce an `Err`; they are recorded on the
    /// returned job. Only persistence failures and orchestration defects do.
    pub async fn run(&self, subject: Subject) -> Result<AnalysisJob, JobError> {
        self.run_with_cancel(subject, CancellationToken::new()).await
    }

    /// Runs a job to completion, stopping early if `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        subject: Subject,
        cancel: CancellationToken,
    ) -> Result<AnalysisJob, JobError> {
        let snapshot = self.create_job(subject, &cancel).await?;
        self.drive(snapshot, cancel).await
    }

    /// Starts a job in the background and returns a handle to it.
    ///
    /// The job is created and persisted before this returns, so a
    /// persistence failure at creation is reported here.
    pub async fn submit(self: &Arc<Self>, subject: Subject) -> Result<JobHandle, JobError> {
        let cancel = CancellationToken::new();
        let snapshot = self.create_job(subject, &cancel).await?;
        let (tx, rx) = watch::channel(None);
        let handle = JobHandle::new(Arc::clone(&snapshot), cancel.clone(), rx);

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = orchestrator.drive(snapshot, cancel).await;
            // The handle may have been dropped
            let _ = tx.send(Some(outcome));
        });

        Ok(handle)
    }

    /// Returns the current state of a job.
    ///
    /// In-flight jobs are read from memory; finished jobs from the store.
    pub async fn get_job(&self, job_id: &str) -> Result<AnalysisJob, JobError> {
        if let Some(active) = self.active.get(job_id) {
            return Ok(read(&active.snapshot).clone());
        }
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| JobError::NotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Cancels an in-flight job. Returns false if no such job is running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.active.get(job_id) {
            Some(active) => {
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns the number of jobs in flight.
    pub fn active_jobs(&self) -> usize {
        self.active.len()
    }

    /// Returns the registered analyzer units.
    pub fn analyzers(&self) -> &[ArcAnalyzer] {
        &self.analyzers
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn create_job(
        &self,
        subject: Subject,
        cancel: &CancellationToken,
    ) -> Result<Arc<RwLock<AnalysisJob>>, JobError> {
        let job = AnalysisJob::new(subject, self.analyzers.iter().map(|a| a.name()));
        self.store.create(&job).await?;

        let id = job.id.clone();
        let snapshot = Arc::new(RwLock::new(job));
        self.active.insert(
            id,
            ActiveJob {
                snapshot: Arc::clone(&snapshot),
                cancel: cancel.clone(),
            },
        );
        Ok(snapshot)
    }

    async fn drive(
        &self,
        snapshot: Arc<RwLock<AnalysisJob>>,
        cancel: CancellationToken,
    ) -> Result<AnalysisJob, JobError> {
        let job_id = read(&snapshot).id.clone();
        let mut guard = DriveGuard {
            orchestrator: self,
            snapshot: &snapshot,
            job_id: &job_id,
            cancel: &cancel,
            finished: false,
        };
        let result = self.execute(&snapshot, &cancel).await;
        guard.finished = true;
        drop(guard);

        if let Err(e) = &result {
            tracing::error!(job_id = %job_id, error = %e, "Analysis job aborted by infrastructure failure");
            fail_snapshot(&snapshot, e);
        }
        result
    }

    async fn execute(
        &self,
        snapshot: &Arc<RwLock<AnalysisJob>>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisJob, JobError> {
        let (job_id, subject) = {
            let mut job = write(snapshot);
            job.transition_to(JobStatus::Processing)?;
            for analyzer in &self.analyzers {
                job.mark_running(analyzer.name())?;
            }
            audit::emit_job_started(&job);
            (job.id.clone(), job.subject.clone())
        };

        tracing::info!(
            job_id = %job_id,
            subject = %subject,
            units = self.analyzers.len(),
            "Starting analysis job"
        );

        self.store
            .update_status(&job_id, JobStatus::Processing)
            .await?;
        for analyzer in &self.analyzers {
            self.store
                .update_progress(&job_id, analyzer.name(), UnitStatus::Running, None)
                .await?;
        }

        let units_cancel = cancel.child_token();
        let mut units: FuturesUnordered<_> = self
            .analyzers
            .iter()
            .map(|analyzer| self.run_unit(analyzer, &subject, &units_cancel))
            .collect();

        let deadline = tokio::time::sleep(self.config.job_timeout);
        tokio::pin!(deadline);

        let mut interruption = None;
        while interruption.is_none() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => interruption = Some(Interruption::Cancelled),
                _ = &mut deadline => interruption = Some(Interruption::TimedOut),
                next = units.next() => match next {
                    Some((unit, result, elapsed)) => {
                        self.record(snapshot, &job_id, &unit, result, elapsed).await?;
                        if !self.min_successes_reachable(snapshot) {
                            interruption = Some(Interruption::Unreachable);
                        }
                    }
                    None => break,
                },
            }
        }

        // Dropping the unit futures aborts their in-flight calls and retries
        units_cancel.cancel();
        drop(units);

        if let Some(interruption) = interruption {
            self.interrupt_pending(snapshot, &job_id, interruption).await?;
        }

        self.finish(snapshot, &job_id, interruption).await
    }

    /// Finalizes a job whose driving future was dropped before it finished.
    ///
    /// Runs synchronously from a destructor; the store is brought up to date
    /// from a spawned task when a runtime is available.
    fn abandon(&self, snapshot: &Arc<RwLock<AnalysisJob>>, job_id: &str) {
        let message = "job cancelled: caller stopped waiting".to_string();
        let (job, interrupted) = {
            let mut job = write(snapshot);
            if job.is_terminal() {
                return;
            }
            let mut interrupted = Vec::new();
            for unit in job.pending_units() {
                let result =
                    UnitResult::failure(UnitError::cancelled(&unit, "job cancelled by caller"));
                if let Ok(true) = job.record_unit(&unit, result.clone()) {
                    interrupted.push((unit, result));
                }
            }
            if let Err(e) = job.finalize(JobStatus::Failed, None, Some(message.clone())) {
                tracing::error!(job_id = %job_id, error = %e, "Failed to finalize abandoned job");
                return;
            }
            (job.clone(), interrupted)
        };

        tracing::warn!(
            job_id = %job_id,
            interrupted = interrupted.len(),
            "Analysis job abandoned by caller, marked failed"
        );
        audit::emit_job_finalized(&job);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(job_id = %job_id, "No runtime available to persist abandoned job");
            return;
        };
        let store = Arc::clone(&self.store);
        let job_id = job_id.to_string();
        runtime.spawn(async move {
            for (unit, result) in &interrupted {
                if let Err(e) = store
                    .update_progress(&job_id, unit, result.status(), Some(result))
                    .await
                {
                    tracing::warn!(job_id = %job_id, unit = %unit, error = %e, "Failed to persist abandoned unit");
                }
            }
            if let Err(e) = store
                .finalize(&job_id, JobStatus::Failed, None, Some(message.as_str()))
                .await
            {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to persist abandoned job");
            }
        });
    }

    /// Runs one unit with its timeout, containing failures and panics.
    async fn run_unit(
        &self,
        analyzer: &ArcAnalyzer,
        subject: &Subject,
        cancel: &CancellationToken,
    ) -> (String, UnitResult, Duration) {
        let name = analyzer.name().to_string();
        let timeout = analyzer.timeout().unwrap_or(self.config.unit_timeout);
        let start = Instant::now();

        let guarded = AssertUnwindSafe(analyzer.analyze(subject, cancel)).catch_unwind();
        let result = match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(Ok(output))) => UnitResult::success(output),
            Ok(Ok(Err(mut error))) => {
                error.unit = name.clone();
                UnitResult::failure(error)
            }
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                UnitResult::failure(UnitError::with_kind(
                    &name,
                    UnitFailureKind::Panicked,
                    format!("panicked: {message}"),
                ))
            }
            Err(_) => UnitResult::failure(UnitError::timed_out(&name, timeout)),
        };

        (name, result, start.elapsed())
    }

    async fn record(
        &self,
        snapshot: &Arc<RwLock<AnalysisJob>>,
        job_id: &str,
        unit: &str,
        result: UnitResult,
        elapsed: Duration,
    ) -> Result<(), JobError> {
        let recorded = write(snapshot).record_unit(unit, result.clone())?;
        if !recorded {
            return Ok(());
        }

        if let Some(error) = result.error() {
            tracing::warn!(
                job_id = %job_id,
                unit = %unit,
                kind = ?error.kind,
                reason = %error.reason,
                "Analyzer unit failed, continuing with others"
            );
        } else {
            tracing::debug!(job_id = %job_id, unit = %unit, "Analyzer unit succeeded");
        }

        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        audit::emit_unit_completed(&UnitAuditEvent::new(job_id, unit, &result, millis));

        self.store
            .update_progress(job_id, unit, result.status(), Some(&result))
            .await
    }

    fn min_successes_reachable(&self, snapshot: &Arc<RwLock<AnalysisJob>>) -> bool {
        let job = read(snapshot);
        let succeeded = job.succeeded_units().len();
        let pending = job.pending_units().len();
        succeeded + pending >= self.config.min_successes
    }

    async fn interrupt_pending(
        &self,
        snapshot: &Arc<RwLock<AnalysisJob>>,
        job_id: &str,
        interruption: Interruption,
    ) -> Result<(), JobError> {
        let pending = read(snapshot).pending_units();
        for unit in pending {
            let error = match interruption {
                Interruption::Cancelled => UnitError::cancelled(&unit, "job cancelled"),
                Interruption::TimedOut => UnitError::with_kind(
                    &unit,
                    UnitFailureKind::Timeout,
                    format!("job timed out after {:?}", self.config.job_timeout),
                ),
                Interruption::Unreachable => {
                    UnitError::cancelled(&unit, "aborted: minimum successes unreachable")
                }
            };
            self.record(
                snapshot,
                job_id,
                &unit,
                UnitResult::failure(error),
                Duration::ZERO,
            )
            .await?;
        }
        Ok(())
    }

    async fn finish(
        &self,
        snapshot: &Arc<RwLock<AnalysisJob>>,
        job_id: &str,
        interruption: Option<Interruption>,
    ) -> Result<AnalysisJob, JobError> {
        let (status, score, message) = {
            let job = read(snapshot);
            let succeeded = job.succeeded_units();
            let failed = job.failed_units();
            let total = job.progress.len();

            let enough = succeeded.len() >= self.config.min_successes;
            let status = match interruption {
                Some(Interruption::Cancelled) | Some(Interruption::TimedOut) => JobStatus::Failed,
                _ if enough => JobStatus::Completed,
                _ => JobStatus::Failed,
            };

            let score = match status {
                JobStatus::Completed => composite_score(succeeded.iter().copied(), &self.config),
                _ => None,
            };

            let headline = match interruption {
                Some(Interruption::Cancelled) => Some("job cancelled".to_string()),
                Some(Interruption::TimedOut) => Some(format!(
                    "job timed out after {:?}",
                    self.config.job_timeout
                )),
                _ if !enough => Some(format!(
                    "only {} of {} required units succeeded",
                    succeeded.len(),
                    self.config.min_successes
                )),
                _ => None,
            };
            let failures = (!failed.is_empty()).then(|| {
                let details: Vec<String> = failed
                    .iter()
                    .map(|(unit, error)| format!("{unit}: {}", error.reason))
                    .collect();
                format!(
                    "{} of {} units failed: {}",
                    failed.len(),
                    total,
                    details.join("; ")
                )
            });
            let message = match (headline, failures) {
                (Some(headline), Some(failures)) => Some(format!("{headline}; {failures}")),
                (headline, failures) => headline.or(failures),
            };

            (status, score, message)
        };

        let job = {
            let mut job = write(snapshot);
            job.finalize(status, score, message.clone())?;
            job.clone()
        };

        self.store
            .finalize(job_id, status, score, message.as_deref())
            .await?;

        tracing::info!(
            job_id = %job_id,
            status = %status,
            composite_score = ?score,
            succeeded = job.succeeded_units().len(),
            failed = job.failed_units().len(),
            duration_seconds = ?job.duration_seconds,
            "Analysis job finished"
        );
        audit::emit_job_finalized(&job);

        Ok(job)
    }
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("analyzer_count", &self.analyzers.len())
            .field("config", &self.config)
            .field("active_jobs", &self.active.len())
            .finish()
    }
}

fn read(snapshot: &RwLock<AnalysisJob>) -> std::sync::RwLockReadGuard<'_, AnalysisJob> {
    snapshot
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(snapshot: &RwLock<AnalysisJob>) -> std::sync::RwLockWriteGuard<'_, AnalysisJob> {
    snapshot
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks the in-memory snapshot failed after an infrastructure error.
///
/// The store may not reflect this; callers receive the error itself.
fn fail_snapshot(snapshot: &RwLock<AnalysisJob>, error: &JobError) {
    let mut job = write(snapshot);
    if job.is_terminal() {
        return;
    }
    for unit in job.pending_units() {
        let failure = UnitError::cancelled(&unit, format!("aborted: {error}"));
        // Units come from the job's own progress map
        let _ = job.record_unit(&unit, UnitResult::failure(failure));
    }
    if job.status == JobStatus::Pending {
        let _ = job.transition_to(JobStatus::Processing);
    }
    let _ = job.finalize(JobStatus::Failed, None, Some(format!("internal error: {error}")));
}
