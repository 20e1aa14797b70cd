//! Analysis job structures.
//!
//! This module defines `AnalysisJob`, the unit of orchestration, and
//! `UnitResult`, the per-unit entry in a job's partial results.

use crate::core::error::{JobError, UnitError};
use crate::core::types::{JobStatus, Subject, UnitOutput, UnitStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The recorded outcome of one analyzer unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitResult {
    /// The unit produced output.
    Success {
        /// The unit's output.
        output: UnitOutput,
    },
    /// The unit failed.
    Failure {
        /// Why the unit failed.
        error: UnitError,
    },
}

impl UnitResult {
    /// Creates a success entry.
    pub fn success(output: UnitOutput) -> Self {
        Self::Success { output }
    }

    /// Creates a failure entry.
    pub fn failure(error: UnitError) -> Self {
        Self::Failure { error }
    }

    /// Returns `true` for a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the output of a successful unit.
    pub fn output(&self) -> Option<&UnitOutput> {
        match self {
            Self::Success { output } => Some(output),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the error of a failed unit.
    pub fn error(&self) -> Option<&UnitError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Returns the unit status this result corresponds to.
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Success { .. } => UnitStatus::Succeeded,
            Self::Failure { .. } => UnitStatus::Failed,
        }
    }
}

impl From<Result<UnitOutput, UnitError>> for UnitResult {
    fn from(result: Result<UnitOutput, UnitError>) -> Self {
        match result {
            Ok(output) => Self::Success { output },
            Err(error) => Self::Failure { error },
        }
    }
}

/// A single analysis of one subject across all analyzer units.
///
/// Every mutation goes through a method that keeps `progress` and
/// `partial_results` consistent, and `status` only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Unique identifier for this job.
    pub id: String,

    /// The subject under analysis.
    pub subject: Subject,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// Progress of each analyzer unit, keyed by unit name.
    pub progress: BTreeMap<String, UnitStatus>,

    /// Results of finished units, keyed by unit name.
    pub partial_results: BTreeMap<String, UnitResult>,

    /// Aggregate score from the succeeded units.
    pub composite_score: Option<f64>,

    /// Summary of failures when the job is not fully successful.
    pub error_message: Option<String>,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job entered a terminal status.
    pub completed_at: Option<DateTime<Utc>>,

    /// Wall-clock duration from creation to the terminal transition.
    pub duration_seconds: Option<f64>,
}

impl AnalysisJob {
    /// Creates a pending job with every unit recorded as `NotStarted`.
    pub fn new<I, S>(subject: Subject, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject,
            status: JobStatus::Pending,
            progress: units
                .into_iter()
                .map(|name| (name.into(), UnitStatus::NotStarted))
                .collect(),
            partial_results: BTreeMap::new(),
            composite_score: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
        }
    }

    /// Returns `true` if the job is `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves the job to `next`, rejecting backwards or sideways transitions.
    pub fn transition_to(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns the progress of a unit.
    pub fn unit_status(&self, unit: &str) -> Option<UnitStatus> {
        self.progress.get(unit).copied()
    }

    /// Marks a unit as running.
    pub fn mark_running(&mut self, unit: &str) -> Result<(), JobError> {
        let entry = self.progress_entry(unit)?;
        if !entry.is_terminal() {
            *entry = UnitStatus::Running;
        }
        Ok(())
    }

    /// Records a unit's terminal result together with its progress entry.
    ///
    /// A unit that already reported keeps its first result.
    pub fn record_unit(&mut self, unit: &str, result: UnitResult) -> Result<bool, JobError> {
        let entry = self.progress_entry(unit)?;
        if entry.is_terminal() {
            return Ok(false);
        }
        *entry = result.status();
        self.partial_results.insert(unit.to_string(), result);
        Ok(true)
    }

    /// Returns the names of units that have not reached a terminal status.
    pub fn pending_units(&self) -> Vec<String> {
        self.progress
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Returns the succeeded units and their outputs.
    pub fn succeeded_units(&self) -> Vec<(&str, &UnitOutput)> {
        self.partial_results
            .iter()
            .filter_map(|(name, result)| result.output().map(|o| (name.as_str(), o)))
            .collect()
    }

    /// Returns the failed units and their errors.
    pub fn failed_units(&self) -> Vec<(&str, &UnitError)> {
        self.partial_results
            .iter()
            .filter_map(|(name, result)| result.error().map(|e| (name.as_str(), e)))
            .collect()
    }

    /// Moves the job to a terminal status and stamps completion time.
    ///
    /// Fails if any unit is still pending.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        composite_score: Option<f64>,
        error_message: Option<String>,
    ) -> Result<(), JobError> {
        if !status.is_terminal() {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        let pending = self.pending_units();
        if !pending.is_empty() {
            return Err(JobError::internal(format!(
                "cannot finalize job {} with pending units: {}",
                self.id,
                pending.join(", ")
            )));
        }
        self.transition_to(status)?;

        let now = Utc::now();
        self.composite_score = composite_score;
        self.error_message = error_message;
        self.completed_at = Some(now);
        self.duration_seconds =
            Some((now - self.created_at).num_milliseconds().max(0) as f64 / 1000.0);
        Ok(())
    }

    fn progress_entry(&mut self, unit: &str) -> Result<&mut UnitStatus, JobError> {
        let id = &self.id;
        self.progress
            .get_mut(unit)
            .ok_or_else(|| JobError::internal(format!("job {id} has no unit named '{unit}'")))
    }
}
