//! Analyzer unit implementations.
//!
//! This module contains implementations of the `Analyzer` trait.
//!
//! ## Available Analyzers
//!
//! - [`http`] - Fetches one JSON endpoint through a resilient client and scores it
//! - [`mock`] - A configurable analyzer for testing
//!
//! ## Implementing a Custom Analyzer
//!
//! Units that call several endpoints, or that parse HTML, implement
//! [`Analyzer`](crate::core::Analyzer) directly and hold one
//! [`ResilientClient`](crate::client::ResilientClient) per dependency:
//!
//! ```rust,ignore
//! use brandscope::client::ResilientClient;
//! use brandscope::core::{Analyzer, Subject, UnitError, UnitOutput};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! pub struct SocialReach {
//!     twitter: Arc<ResilientClient>,
//! }
//!
//! #[async_trait]
//! impl Analyzer for SocialReach {
//!     fn name(&self) -> &str {
//!         "social"
//!     }
//!
//!     async fn analyze(
//!         &self,
//!         subject: &Subject,
//!         cancel: &CancellationToken,
//!     ) -> Result<UnitOutput, UnitError> {
//!         let url = format!("https://api.twitter.test/lookup?q={}", subject.host());
//!         let profile: serde_json::Value = self
//!             .twitter
//!             .get_json(&url, &[], cancel)
//!             .await
//!             .map_err(|e| UnitError::from_resilience(self.name(), &e))?;
//!         Ok(UnitOutput::new(profile))
//!     }
//! }
//! ```

pub mod http;
pub mod mock;

// Re-exports
pub use http::HttpAnalyzer;
pub use mock::{MockAnalyzer, MockBehavior};
