//! Core traits for the brandscope library.
//!
//! This module defines the `Analyzer` trait that every analyzer unit
//! implements.

use crate::core::error::UnitError;
use crate::core::types::{Subject, UnitOutput};

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// An independent capability that produces one facet of the composite report.
///
/// Analyzer units (site scraping, SEO metrics, social reach, AI assessment,
/// page-speed audits, ...) implement this trait and make their outbound calls
/// through a [`ResilientClient`](crate::client::ResilientClient).
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; units of one job run concurrently.
/// - Failures are returned as [`UnitError`] values. They are recorded as data
///   and never abort sibling units.
/// - `cancel` fires when the job is cancelled, times out, or is aborted.
///   Pass it to every resilient call so in-flight attempts stop promptly.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use brandscope::core::{Analyzer, Subject, UnitError, UnitOutput};
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Debug)]
/// struct DomainAge;
///
/// #[async_trait]
/// impl Analyzer for DomainAge {
///     fn name(&self) -> &str {
///         "domain_age"
///     }
///
///     async fn analyze(
///         &self,
///         subject: &Subject,
///         cancel: &CancellationToken,
///     ) -> Result<UnitOutput, UnitError> {
///         // Look up the domain...
///         Ok(UnitOutput::scored(80.0))
///     }
/// }
/// ```
#[async_trait]
pub trait Analyzer: Send + Sync + Debug {
    /// Returns the unit's name.
    ///
    /// Names key the job's progress and result maps, so they must be unique
    /// within one orchestrator.
    fn name(&self) -> &str;

    /// Analyzes the subject.
    async fn analyze(
        &self,
        subject: &Subject,
        cancel: &CancellationToken,
    ) -> Result<UnitOutput, UnitError>;

    /// Returns a unit-specific timeout overriding the orchestrator default.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// An arc-wrapped analyzer for shared ownership.
pub type ArcAnalyzer = std::sync::Arc<dyn Analyzer>;
