//! Audit event types and emission functions.

use crate::circuit_breaker::CircuitState;
use crate::core::{AnalysisJob, UnitResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `tracing` target every audit event is emitted on.
pub const AUDIT_TARGET: &str = "brandscope::audit";

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit record of a job reaching a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Job ID.
    pub job_id: String,

    /// Subject under analysis.
    pub subject: String,

    /// Terminal status.
    pub status: String,

    /// Composite score, if computed.
    pub composite_score: Option<f64>,

    /// Names of succeeded units.
    pub succeeded_units: Vec<String>,

    /// Names of failed units.
    pub failed_units: Vec<String>,

    /// Failure summary.
    pub error_message: Option<String>,

    /// Job duration in seconds.
    pub duration_seconds: Option<f64>,
}

impl From<&AnalysisJob> for JobAuditEvent {
    fn from(job: &AnalysisJob) -> Self {
        Self {
            timestamp: job.completed_at.unwrap_or_else(Utc::now),
            job_id: job.id.clone(),
            subject: job.subject.to_string(),
            status: job.status.to_string(),
            composite_score: job.composite_score,
            succeeded_units: job
                .succeeded_units()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect(),
            failed_units: job
                .failed_units()
                .into_iter()
                .map(|(name, _)| name.to_string())
                .collect(),
            error_message: job.error_message.clone(),
            duration_seconds: job.duration_seconds,
        }
    }
}

impl AuditEvent for JobAuditEvent {
    fn event_type(&self) -> &'static str {
        "job_finalized"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit record of one analyzer unit finishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Job ID.
    pub job_id: String,

    /// Unit name.
    pub unit: String,

    /// `succeeded` or `failed`.
    pub outcome: String,

    /// Unit score, if any.
    pub score: Option<f64>,

    /// Failure reason, if any.
    pub reason: Option<String>,

    /// Unit run time in milliseconds.
    pub duration_ms: u64,
}

impl UnitAuditEvent {
    /// Creates an event from a recorded unit result.
    pub fn new(job_id: &str, unit: &str, result: &UnitResult, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id: job_id.to_string(),
            unit: unit.to_string(),
            outcome: result.status().to_string(),
            score: result.output().and_then(|output| output.score),
            reason: result.error().map(|error| error.reason.clone()),
            duration_ms,
        }
    }
}

impl AuditEvent for UnitAuditEvent {
    fn event_type(&self) -> &'static str {
        "unit_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a job starting.
pub fn emit_job_started(job: &AnalysisJob) {
    let units: Vec<&str> = job.progress.keys().map(String::as_str).collect();

    tracing::info!(
        target: "brandscope::audit",
        event_type = "job_started",
        job_id = %job.id,
        subject = %job.subject,
        units = ?units,
        unit_count = units.len(),
        "Analysis job started"
    );
}

/// Emits an audit event for a unit completing.
pub fn emit_unit_completed(event: &UnitAuditEvent) {
    tracing::info!(
        target: "brandscope::audit",
        event_type = event.event_type(),
        job_id = %event.job_id,
        unit = %event.unit,
        outcome = %event.outcome,
        score = ?event.score,
        reason = ?event.reason,
        duration_ms = event.duration_ms,
        "Analyzer unit completed"
    );
}

/// Emits an audit event for a job reaching a terminal status.
pub fn emit_job_finalized(job: &AnalysisJob) {
    let event = JobAuditEvent::from(job);

    tracing::info!(
        target: "brandscope::audit",
        event_type = event.event_type(),
        job_id = %event.job_id,
        subject = %event.subject,
        status = %event.status,
        composite_score = ?event.composite_score,
        succeeded_units = ?event.succeeded_units,
        failed_units = ?event.failed_units,
        error_message = ?event.error_message,
        duration_seconds = ?event.duration_seconds,
        "Analysis job finalized"
    );
}

/// Emits an audit event for a circuit breaker changing state.
pub fn emit_breaker_transition(dependency: &str, from: CircuitState, to: CircuitState) {
    tracing::info!(
        target: "brandscope::audit",
        event_type = "breaker_transition",
        dependency = %dependency,
        from = %from,
        to = %to,
        "Circuit breaker transition"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobStatus, Subject, UnitError, UnitOutput};

    #[test]
    fn test_job_audit_event_from_job() {
        let mut job = AnalysisJob::new(Subject::new("acme.com").unwrap(), ["seo", "social"]);
        job.transition_to(JobStatus::Processing).unwrap();
        job.record_unit("seo", UnitResult::success(UnitOutput::scored(70.0)))
            .unwrap();
        job.record_unit("social", UnitResult::failure(UnitError::new("social", "quota")))
            .unwrap();
        job.finalize(JobStatus::Completed, Some(70.0), Some("social: quota".into()))
            .unwrap();

        let event = JobAuditEvent::from(&job);
        assert_eq!(event.event_type(), "job_finalized");
        assert_eq!(event.status, "completed");
        assert_eq!(event.succeeded_units, vec!["seo"]);
        assert_eq!(event.failed_units, vec!["social"]);
        assert_eq!(Some(event.timestamp), job.completed_at);
    }

    #[test]
    fn test_unit_audit_event() {
        let result = UnitResult::failure(UnitError::new("social", "quota"));
        let event = UnitAuditEvent::new("job-1", "social", &result, 12);

        assert_eq!(event.event_type(), "unit_completed");
        assert_eq!(event.outcome, "failed");
        assert_eq!(event.reason.as_deref(), Some("quota"));
        assert_eq!(event.score, None);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["unit"], "social");
    }
}
