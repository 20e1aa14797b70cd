//! Core types and traits for the brandscope library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Subjects, job and unit status enums, unit output
//! - [`traits`] - The `Analyzer` trait
//! - [`error`] - Structured error types
//! - [`result`] - The `AnalysisJob` record and per-unit results

pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types at the core level
pub use error::{
    CacheError, FailureKind, JobError, JobResult, ResilienceError, ResilienceResult, UnitError,
    UnitFailureKind,
};
pub use result::{AnalysisJob, UnitResult};
pub use traits::{Analyzer, ArcAnalyzer};
pub use types::{JobStatus, Subject, UnitOutput, UnitStatus};
