//! # Brandscope
//!
//! Resilience and orchestration core for multi-source brand analysis:
//! per-dependency circuit breakers, retry with backoff, cached outbound
//! calls, and an orchestrator that fans an analysis job out to independent
//! analyzer units with partial-failure semantics.
//!
//! ## Overview
//!
//! Brandscope sits between analyzer units and the third-party services they
//! depend on (SEO metrics, social networks, AI providers, page-speed audits,
//! scraped pages). It lets you:
//!
//! - Make outbound calls through a [`ResilientClient`] that combines a
//!   response cache, a retry policy and a circuit breaker per dependency
//! - Fail fast while a dependency is unhealthy and probe it after a cooldown
//! - Run a job across many analyzer units concurrently, with per-unit and
//!   global timeouts and cooperative cancellation
//! - Keep a job alive when some units fail, and aggregate the survivors into
//!   a composite score
//! - Emit structured audit events for job and breaker lifecycle changes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brandscope::prelude::*;
//! use brandscope::analyzers::HttpAnalyzer;
//! use brandscope::transport::ReqwestTransport;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ResilienceRegistry::builder()
//!         .with_transport(ReqwestTransport::new(Duration::from_secs(5))?)
//!         .build()?;
//!
//!     let orchestrator = AnalysisOrchestrator::builder()
//!         .add_analyzer(HttpAnalyzer::new(
//!             "seo",
//!             registry.client("moz"),
//!             "https://api.example.com/seo?site={host}",
//!         ))
//!         .add_analyzer(HttpAnalyzer::new(
//!             "pagespeed",
//!             registry.client("pagespeed"),
//!             "https://api.example.com/speed?url={url}",
//!         ))
//!         .build()?;
//!
//!     let job = orchestrator.run(Subject::new("acme.com")?).await?;
//!     println!("{}: {:?}", job.status, job.composite_score);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - No optional features
//! - `http` - A `reqwest`-backed [`Transport`](transport::Transport)
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Subjects, job records, the `Analyzer` trait and error types
//! - **Circuit Breaker**: Per-dependency health gating
//! - **Retry**: Backoff policy and the retry loop
//! - **Cache**: Response cache keyed by request parameters
//! - **Transport**: The raw HTTP seam, with a scripted mock
//! - **Client**: Resilient clients and the registry that owns them
//! - **Analyzers**: Ready-made analyzer units
//! - **Orchestrator**: Job execution, persistence seam and scoring
//! - **Audit**: Structured lifecycle events

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod analyzers;
pub mod audit;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod core;
pub mod orchestrator;
pub mod retry;
pub mod transport;

// Re-export commonly used types at the crate root
pub use crate::core::{
    AnalysisJob, Analyzer, JobError, JobStatus, ResilienceError, Subject, UnitError, UnitOutput,
    UnitResult, UnitStatus,
};

pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use crate::client::{ResilienceRegistry, ResilientClient};
pub use crate::orchestrator::{AnalysisOrchestrator, JobHandle, OrchestratorConfig};
pub use crate::retry::RetryPolicy;

/// Prelude module for convenient imports.
///
/// ```rust
/// use brandscope::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cache::{InMemoryCache, ResponseCache};
    pub use crate::circuit_breaker::{
        BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState,
    };
    pub use crate::client::{OutboundRequest, ResilienceRegistry, ResilientClient};
    pub use crate::core::{
        AnalysisJob, Analyzer, JobError, JobStatus, ResilienceError, Subject, UnitError,
        UnitOutput, UnitResult, UnitStatus,
    };
    pub use crate::orchestrator::{
        AnalysisOrchestrator, JobHandle, JobStore, OrchestratorConfig,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::transport::{HttpRequest, HttpResponse, Transport};
}
