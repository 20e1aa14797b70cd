//! Retry policy configuration and backoff computation.

use crate::core::{FailureKind, ResilienceError};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Configuration for retry behavior.
///
/// The delay before retry `attempt` (0-indexed) is
/// `min(base_delay * exponential_base^attempt, max_delay)`, scaled by a
/// uniform random factor in `[0.5, 1.5)` when jitter is enabled and capped at
/// `max_delay` again afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub exponential_base: f64,

    /// Whether to randomize delays.
    pub jitter: bool,

    /// HTTP statuses treated as transient.
    pub retryable_status_codes: BTreeSet<u16>,

    /// Transport failure kinds treated as transient.
    pub retryable_failure_kinds: BTreeSet<FailureKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            retryable_status_codes: [429, 500, 502, 503, 504].into_iter().collect(),
            retryable_failure_kinds: [FailureKind::Connect, FailureKind::Timeout]
                .into_iter()
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Few retries with a longer base delay.
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(2),
            ..Self::default()
        }
    }

    /// More retries with a shorter base delay.
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            ..Self::default()
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier. Values of 1.0 or less are raised just above 1.0.
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = if base.is_finite() && base > 1.0 {
            base
        } else {
            1.0 + f64::EPSILON
        };
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replaces the set of retryable HTTP statuses.
    pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Replaces the set of retryable transport failure kinds.
    pub fn with_retryable_failure_kinds(
        mut self,
        kinds: impl IntoIterator<Item = FailureKind>,
    ) -> Self {
        self.retryable_failure_kinds = kinds.into_iter().collect();
        self
    }

    /// Returns the maximum number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns `true` if the HTTP status is retryable under this policy.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Returns `true` if the failure is transient under this policy.
    pub fn is_retryable(&self, error: &ResilienceError) -> bool {
        match error {
            ResilienceError::Transient { kind, .. } => self.retryable_failure_kinds.contains(kind),
            ResilienceError::RetryableStatus { status, .. } => self.is_retryable_status(*status),
            _ => false,
        }
    }

    /// Returns whether another attempt should follow the failed `attempt`.
    pub fn should_retry(&self, attempt: u32, error: &ResilienceError) -> bool {
        attempt < self.max_retries && self.is_retryable(error)
    }

    /// Calculates the backoff delay after the failed `attempt` (0-indexed).
    ///
    /// The result never exceeds `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let max_secs = self.max_delay.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let capped = (self.base_delay.as_secs_f64() * self.exponential_base.powi(exponent))
            .min(max_secs);

        let delay = if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            (capped * factor).min(max_secs)
        } else {
            capped
        };

        Duration::try_from_secs_f64(delay).unwrap_or(self.max_delay)
    }

    /// Calculates the delay after a specific failure.
    ///
    /// An HTTP 429 carrying an integer `Retry-After` waits at least that long;
    /// server guidance only ever lengthens the computed delay.
    pub fn delay_for_failure(&self, attempt: u32, error: &ResilienceError) -> Duration {
        let delay = self.delay_for(attempt);
        match error {
            ResilienceError::RetryableStatus {
                status: 429,
                retry_after: Some(retry_after),
                ..
            } => delay.max(*retry_after),
            _ => delay,
        }
    }
}

/// Parses a `Retry-After` header value.
///
/// Only the integer-seconds form is honored; HTTP dates yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, retry_after: Option<Duration>) -> ResilienceError {
        ResilienceError::RetryableStatus {
            dependency: "moz".into(),
            status: code,
            retry_after,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.jitter);
        assert!(policy.is_retryable_status(503));
        assert!(!policy.is_retryable_status(404));
    }

    #[test]
    fn test_presets() {
        let conservative = RetryPolicy::conservative();
        let aggressive = RetryPolicy::aggressive();
        assert!(conservative.max_retries < aggressive.max_retries);
        assert!(conservative.base_delay > aggressive.base_delay);
        assert_eq!(RetryPolicy::no_retry().max_attempts(), 1);
    }

    #[test]
    fn test_should_retry_stops_at_max_retries() {
        let policy = RetryPolicy::new().with_max_retries(2);
        let err = ResilienceError::transient("moz", FailureKind::Timeout, "slow");

        assert!(policy.should_retry(0, &err));
        assert!(policy.should_retry(1, &err));
        assert!(!policy.should_retry(2, &err));
    }

    #[test]
    fn test_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ResilienceError::transient(
            "moz",
            FailureKind::Connect,
            "refused"
        )));
        assert!(!policy.is_retryable(&ResilienceError::transient(
            "moz",
            FailureKind::Other,
            "tls"
        )));
        assert!(policy.is_retryable(&status(429, None)));
        assert!(!policy.is_retryable(&ResilienceError::permanent("moz", "HTTP 404", Some(404))));
        assert!(!policy.is_retryable(&ResilienceError::circuit_open("moz", None)));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_exponential_base(2.0)
            .with_jitter(false);

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_monotonic_and_capped() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_exponential_base(10.0)
            .with_jitter(false);

        let mut previous = Duration::ZERO;
        for attempt in 0..40 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= previous);
            assert!(delay <= policy.max_delay);
            previous = delay;
        }
        assert_eq!(policy.delay_for(2), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(150));

        for _ in 0..200 {
            let delay = policy.delay_for(0);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_retry_after_only_lengthens_429() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(false);

        let long = status(429, Some(Duration::from_secs(5)));
        assert_eq!(policy.delay_for_failure(0, &long), Duration::from_secs(5));

        let short = status(429, Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for_failure(0, &short), Duration::from_millis(100));

        let unavailable = status(503, Some(Duration::from_secs(5)));
        assert_eq!(
            policy.delay_for_failure(0, &unavailable),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }
}
