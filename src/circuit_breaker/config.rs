//! Circuit breaker configuration.

use crate::core::{FailureKind, ResilienceError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting probe calls.
    pub recovery_timeout: Duration,

    /// Number of successful probes needed to close the circuit, and the
    /// maximum number of probes admitted while half-open.
    pub half_open_max_calls: u32,

    /// What types of failures count toward the threshold.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the recovery timeout.
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the maximum number of half-open probe calls.
    pub fn with_half_open_max_calls(mut self, max: u32) -> Self {
        self.half_open_max_calls = max.max(1);
        self
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Creates a configuration for dependencies that should be shed quickly.
    ///
    /// This configuration:
    /// - Uses a lower failure threshold (3)
    /// - Keeps circuits open longer (120 seconds)
    /// - Closes after a single successful probe
    pub fn strict() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(120),
            half_open_max_calls: 1,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Creates a configuration for dependencies with bursty but tolerable errors.
    ///
    /// This configuration:
    /// - Uses a higher failure threshold (10)
    /// - Keeps circuits open for a shorter time (30 seconds)
    /// - Ignores client errors (4xx other than retryable ones)
    pub fn lenient() -> Self {
        Self {
            failure_threshold: 10,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
            failure_policy: FailurePolicy::transport_only(),
        }
    }
}

/// Defines what types of failures count toward the breaker threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Count timeouts as failures.
    pub count_timeouts: bool,
    /// Count connection failures as failures.
    pub count_connection_failures: bool,
    /// Count retryable statuses (429, 5xx) as failures.
    pub count_retryable_status: bool,
    /// Count non-retryable 5xx responses and malformed responses as failures.
    pub count_server_errors: bool,
    /// Count non-retryable 4xx responses as failures.
    pub count_client_errors: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            count_timeouts: true,
            count_connection_failures: true,
            count_retryable_status: true,
            count_server_errors: true,
            count_client_errors: true,
        }
    }
}

impl FailurePolicy {
    /// Creates a new failure policy counting every failed attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy that ignores non-retryable client errors.
    pub fn transport_only() -> Self {
        Self {
            count_client_errors: false,
            ..Self::default()
        }
    }

    /// Determines if a failed attempt should be counted against the breaker.
    pub fn should_count(&self, error: &ResilienceError) -> bool {
        match error {
            ResilienceError::Transient { kind, .. } => match kind {
                FailureKind::Timeout => self.count_timeouts,
                FailureKind::Connect | FailureKind::Other => self.count_connection_failures,
            },
            ResilienceError::RetryableStatus { .. } => self.count_retryable_status,
            ResilienceError::Permanent {
                status: Some(status),
                ..
            } if (400..500).contains(status) => self.count_client_errors,
            ResilienceError::Permanent { .. } => self.count_server_errors,
            ResilienceError::ExhaustedRetries { last, .. } => self.should_count(last),
            ResilienceError::CircuitOpen { .. }
            | ResilienceError::Cancelled { .. }
            | ResilienceError::Configuration { .. } => false,
        }
    }
}
