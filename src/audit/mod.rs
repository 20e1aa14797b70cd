//! Structured audit logging.
//!
//! This module provides functions for emitting structured lifecycle events
//! using the `tracing` crate on the `brandscope::audit` target. Events can be
//! captured by any tracing subscriber (JSON file, OpenTelemetry, etc.) and
//! routed separately from diagnostic logs.

mod events;

pub use events::{
    emit_breaker_transition, emit_job_finalized, emit_job_started, emit_unit_completed,
    AuditEvent, JobAuditEvent, UnitAuditEvent, AUDIT_TARGET,
};
