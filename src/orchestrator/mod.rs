//! Analysis orchestration.
//!
//! The [`AnalysisOrchestrator`] fans one job out to every registered analyzer
//! unit, records each unit's outcome as it arrives, and aggregates the
//! succeeded units into a composite score.
//!
//! ## Partial failure
//!
//! Unit failures, timeouts and panics are contained at the unit boundary and
//! recorded as data. A job completes when at least `min_successes` units
//! succeed and fails otherwise. When the minimum becomes unreachable the
//! remaining units are aborted early.
//!
//! ## Cancellation and timeouts
//!
//! Each unit has its own timeout and the whole job has a global one. On job
//! timeout or cancellation, in-flight units are dropped together with their
//! outbound calls, so no further retries are attempted, and the job is
//! finalized as failed with an explicit reason.

mod config;
mod engine;
mod handle;
mod score;
mod store;

pub use config::OrchestratorConfig;
pub use handle::JobHandle;
pub use engine::{AnalysisOrchestrator, AnalysisOrchestratorBuilder};
pub use score::composite_score;
pub use store::{InMemoryJobStore, JobStore, NoOpJobStore};
