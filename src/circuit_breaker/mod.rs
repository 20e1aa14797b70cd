//! Per-dependency circuit breakers.
//!
//! The circuit breaker pattern prevents cascading failures by temporarily
//! stopping traffic to a failing dependency and probing it after a recovery
//! timeout to detect recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; calls pass through, failures are counted.
//! - **Open**: The dependency is failing; calls are rejected immediately.
//! - **Half-Open**: A limited number of probe calls are admitted.
//!
//! The Open to Half-Open transition happens lazily when the state is read
//! after the recovery timeout has elapsed. There is no background timer, so
//! [`CircuitBreaker::state`] and [`CircuitBreaker::is_available`] may mutate
//! the breaker. Read the state once per decision if a stable view is needed.
//!
//! ## Usage
//!
//! ```rust
//! use brandscope::circuit_breaker::{BreakerRegistry, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let registry = BreakerRegistry::new(
//!     CircuitBreakerConfig::default()
//!         .with_failure_threshold(5)
//!         .with_recovery_timeout(Duration::from_secs(60)),
//! );
//!
//! let moz = registry.get_or_create("moz");
//! assert!(moz.is_available());
//! ```

mod breaker;
mod config;
mod registry;
mod state;

pub use breaker::{CircuitBreaker, ProbePermit};
pub use config::{CircuitBreakerConfig, FailurePolicy};
pub use registry::BreakerRegistry;
pub use state::{BreakerMetrics, BreakerSnapshot, BreakerState, CircuitState};
