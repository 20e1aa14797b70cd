//! Error types for the brandscope library.
//!
//! Failures are layered to match where they are contained:
//!
//! - [`ResilienceError`] describes a single outbound call to a dependency.
//! - [`UnitError`] is the typed failure value an analyzer unit reports. It is
//!   data, never propagated past the orchestrator.
//! - [`JobError`] is the only error an orchestrator caller ever sees, and only
//!   for infrastructure defects such as persistence failures.
//!
//! The library never panics; all errors are returned as `Result` values.

use crate::core::types::JobStatus;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification tag for a failed transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The connection could not be established.
    Connect,
    /// No response arrived within the allotted time.
    Timeout,
    /// Any other transport-level failure.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Timeout => write!(f, "timeout"),
            Self::Other => write!(f, "transport"),
        }
    }
}

/// The error type for calls made through a resilient client.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError {
    /// The dependency's circuit breaker rejected the call without attempting it.
    #[error("circuit breaker open for dependency '{dependency}'")]
    CircuitOpen {
        /// Name of the dependency whose circuit is open.
        dependency: String,
        /// Time remaining until the breaker admits probe calls, if known.
        recovery_hint: Option<Duration>,
    },

    /// A connect, timeout or other transport failure.
    #[error("{kind} failure calling '{dependency}': {message}")]
    Transient {
        /// Name of the dependency.
        dependency: String,
        /// Classification of the failure.
        kind: FailureKind,
        /// Description from the transport.
        message: String,
    },

    /// The dependency answered with a status the retry policy treats as transient.
    #[error("dependency '{dependency}' returned retryable status {status}")]
    RetryableStatus {
        /// Name of the dependency.
        dependency: String,
        /// HTTP status code.
        status: u16,
        /// Integer `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// A non-retryable status or a malformed response.
    #[error("permanent failure calling '{dependency}': {reason}")]
    Permanent {
        /// Name of the dependency.
        dependency: String,
        /// Human-readable reason.
        reason: String,
        /// HTTP status code, when the failure came from a response.
        status: Option<u16>,
    },

    /// Every allowed attempt failed with a retryable failure.
    #[error("retries exhausted for '{dependency}' after {attempts} attempts: {last}")]
    ExhaustedRetries {
        /// Name of the dependency.
        dependency: String,
        /// Number of attempts performed.
        attempts: u32,
        /// The failure observed on the final attempt.
        last: Box<ResilienceError>,
    },

    /// The call was cancelled before it could complete.
    #[error("call to '{dependency}' was cancelled")]
    Cancelled {
        /// Name of the dependency.
        dependency: String,
    },

    /// The call was malformed or the client is misconfigured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ResilienceError {
    /// Creates a `CircuitOpen` error.
    pub fn circuit_open(dependency: impl Into<String>, recovery_hint: Option<Duration>) -> Self {
        Self::CircuitOpen {
            dependency: dependency.into(),
            recovery_hint,
        }
    }

    /// Creates a `Transient` error.
    pub fn transient(
        dependency: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transient {
            dependency: dependency.into(),
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Permanent` error.
    pub fn permanent(
        dependency: impl Into<String>,
        reason: impl Into<String>,
        status: Option<u16>,
    ) -> Self {
        Self::Permanent {
            dependency: dependency.into(),
            reason: reason.into(),
            status,
        }
    }

    /// Creates a `Cancelled` error.
    pub fn cancelled(dependency: impl Into<String>) -> Self {
        Self::Cancelled {
            dependency: dependency.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns the dependency name if this error is associated with one.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::CircuitOpen { dependency, .. }
            | Self::Transient { dependency, .. }
            | Self::RetryableStatus { dependency, .. }
            | Self::Permanent { dependency, .. }
            | Self::ExhaustedRetries { dependency, .. }
            | Self::Cancelled { dependency } => Some(dependency),
            Self::Configuration { .. } => None,
        }
    }

    /// Returns the HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RetryableStatus { status, .. } => Some(*status),
            Self::Permanent { status, .. } => *status,
            Self::ExhaustedRetries { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Returns the transport failure kind, if this is a transient failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Transient { kind, .. } => Some(*kind),
            Self::ExhaustedRetries { last, .. } => last.failure_kind(),
            _ => None,
        }
    }

    /// Returns `true` if the call was rejected by an open circuit.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Broad category of an analyzer unit failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailureKind {
    /// A dependency call failed after resilience handling.
    Dependency,
    /// The dependency's circuit was open.
    CircuitOpen,
    /// The unit exceeded its timeout.
    Timeout,
    /// The unit was cancelled or aborted by the orchestrator.
    Cancelled,
    /// The unit panicked.
    Panicked,
    /// The unit produced an unusable result.
    Analysis,
}

/// A typed failure reported by a single analyzer unit.
///
/// Unit failures are contained at the unit boundary and recorded in the
/// job's partial results; they never abort sibling units.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("unit '{unit}' failed: {reason}")]
pub struct UnitError {
    /// Name of the failed unit.
    pub unit: String,
    /// Category of the failure.
    pub kind: UnitFailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl UnitError {
    /// Creates an analysis failure.
    pub fn new(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_kind(unit, UnitFailureKind::Analysis, reason)
    }

    /// Creates a failure of the given kind.
    pub fn with_kind(
        unit: impl Into<String>,
        kind: UnitFailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            unit: unit.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// Creates a timeout failure.
    pub fn timed_out(unit: impl Into<String>, after: Duration) -> Self {
        Self::with_kind(
            unit,
            UnitFailureKind::Timeout,
            format!("timed out after {after:?}"),
        )
    }

    /// Creates a cancellation failure.
    pub fn cancelled(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_kind(unit, UnitFailureKind::Cancelled, reason)
    }

    /// Converts a dependency failure into a unit failure.
    pub fn from_resilience(unit: impl Into<String>, error: &ResilienceError) -> Self {
        let kind = match error {
            ResilienceError::CircuitOpen { .. } => UnitFailureKind::CircuitOpen,
            ResilienceError::Cancelled { .. } => UnitFailureKind::Cancelled,
            _ => UnitFailureKind::Dependency,
        };
        Self::with_kind(unit, kind, error.to_string())
    }
}

/// Error returned by a cache backend.
#[derive(Debug, Clone, Error)]
#[error("cache backend error: {message}")]
pub struct CacheError {
    /// Description of the failure.
    pub message: String,
}

impl CacheError {
    /// Creates a new cache error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The job persistence collaborator failed.
    #[error("failed to persist job {job_id}: {message}")]
    Persistence {
        /// ID of the affected job.
        job_id: String,
        /// Description of the failure.
        message: String,
    },

    /// No job with the given ID exists.
    #[error("job {job_id} not found")]
    NotFound {
        /// The missing job ID.
        job_id: String,
    },

    /// A status change would move the job backwards.
    #[error("invalid job status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// The analysis subject was rejected.
    #[error("invalid subject: {reason}")]
    InvalidSubject {
        /// Why the subject was rejected.
        reason: String,
    },

    /// Orchestrator configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An internal orchestration defect.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the defect.
        message: String,
    },
}

impl JobError {
    /// Creates a `Persistence` error.
    pub fn persistence(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for resilient calls.
pub type ResilienceResult<T> = Result<T, ResilienceError>;

/// A specialized `Result` type for orchestration.
pub type JobResult<T> = Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_accessor() {
        let err = ResilienceError::circuit_open("moz", None);
        assert_eq!(err.dependency(), Some("moz"));
        assert!(err.is_circuit_open());

        let cfg = ResilienceError::configuration("bad");
        assert_eq!(cfg.dependency(), None);
    }

    #[test]
    fn test_status_through_exhausted_retries() {
        let last = ResilienceError::RetryableStatus {
            dependency: "pagespeed".into(),
            status: 503,
            retry_after: None,
        };
        let err = ResilienceError::ExhaustedRetries {
            dependency: "pagespeed".into(),
            attempts: 4,
            last: Box::new(last),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("4 attempts"));
    }

    #[test]
    fn test_unit_error_from_resilience() {
        let err = ResilienceError::circuit_open("twitter", Some(Duration::from_secs(5)));
        let unit = UnitError::from_resilience("social", &err);
        assert_eq!(unit.kind, UnitFailureKind::CircuitOpen);
        assert_eq!(unit.unit, "social");
        assert!(unit.reason.contains("twitter"));

        let cancelled = UnitError::from_resilience("social", &ResilienceError::cancelled("twitter"));
        assert_eq!(cancelled.kind, UnitFailureKind::Cancelled);
    }

    #[test]
    fn test_job_error_display() {
        let err = JobError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Processing,
        };
        assert_eq!(
            err.to_string(),
            "invalid job status transition from completed to processing"
        );
    }
}
