//! Circuit breaker implementation.

use crate::audit;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerSnapshot, BreakerState, CircuitState};
use crate::core::ResilienceError;

use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// A circuit breaker guarding one named dependency.
///
/// The breaker monitors failures and prevents cascading failures by
/// temporarily rejecting calls to an unhealthy dependency. All methods take
/// `&self` and are safe to call concurrently from every caller sharing the
/// breaker; each breaker has its own locks, so unrelated dependencies never
/// contend.
///
/// # States
///
/// - **Closed**: Calls pass through; consecutive failures are counted.
/// - **Open**: Calls are rejected until the recovery timeout elapses.
/// - **Half-Open**: Up to `half_open_max_calls` probes are admitted. That many
///   successes close the circuit; a single failure reopens it.
///
/// # Example
///
/// ```rust
/// use brandscope::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
///
/// let breaker = CircuitBreaker::new("moz", CircuitBreakerConfig::default().with_failure_threshold(2));
///
/// breaker.record_failure();
/// breaker.record_failure();
/// assert!(!breaker.is_available());
/// ```
pub struct CircuitBreaker {
    /// Name of the guarded dependency.
    name: String,
    /// Current state of the circuit.
    state: RwLock<BreakerState>,
    /// Configuration.
    config: CircuitBreakerConfig,
    /// Metrics.
    metrics: RwLock<BreakerMetrics>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker for the named dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(BreakerState::closed()),
            config,
            metrics: RwLock::new(BreakerMetrics::new()),
        }
    }

    /// Creates a new circuit breaker with default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Returns the name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the current circuit state.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// as a side effect of this read.
    pub fn state(&self) -> CircuitState {
        let mut state = self.write_state();
        self.refresh(&mut state, Instant::now());
        state.circuit
    }

    /// Returns `true` if the breaker currently permits a call.
    ///
    /// Like [`state`](Self::state), this may perform the lazy
    /// Open to Half-Open transition.
    pub fn is_available(&self) -> bool {
        let mut state = self.write_state();
        self.refresh(&mut state, Instant::now());
        match state.circuit {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => state.half_open_admitted < self.config.half_open_max_calls,
        }
    }

    /// Admits a call or rejects it with [`ResilienceError::CircuitOpen`].
    ///
    /// While half-open, each admission reserves one of the
    /// `half_open_max_calls` probe slots. The slot belongs to the returned
    /// [`ProbePermit`]: settle it with [`ProbePermit::success`] or
    /// [`ProbePermit::failure`], or drop it to hand the slot back, which is
    /// what happens when the calling future is cancelled or times out.
    /// A rejection is not a failure and does not change the failure count.
    pub fn guard(&self) -> Result<ProbePermit<'_>, ResilienceError> {
        let mut state = self.write_state();
        let now = Instant::now();
        self.refresh(&mut state, now);

        let recovery_hint = match state.circuit {
            CircuitState::Closed => return Ok(ProbePermit::new(self, None)),
            CircuitState::HalfOpen => {
                if state.half_open_admitted < self.config.half_open_max_calls {
                    state.half_open_admitted += 1;
                    return Ok(ProbePermit::new(self, Some(state.probe_generation)));
                }
                None
            }
            CircuitState::Open => state
                .last_failure_at
                .map(|at| self.config.recovery_timeout.saturating_sub(now.duration_since(at))),
        };
        drop(state);

        self.write_metrics().record_rejected();
        Err(ResilienceError::circuit_open(&self.name, recovery_hint))
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut state = self.write_state();
        self.write_metrics().record_success();

        match state.circuit {
            CircuitState::Closed => {
                state.failure_count = 0;
            }

            CircuitState::HalfOpen => {
                state.half_open_calls += 1;
                state.half_open_admitted = state.half_open_admitted.max(state.half_open_calls);
                if state.half_open_calls >= self.config.half_open_max_calls {
                    state.close();
                    self.write_metrics().record_closed();
                    tracing::info!(dependency = %self.name, "Circuit closed after successful probes");
                    audit::emit_breaker_transition(
                        &self.name,
                        CircuitState::HalfOpen,
                        CircuitState::Closed,
                    );
                }
            }

            CircuitState::Open => {
                // A call admitted before the circuit opened; nothing to do
            }
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let mut state = self.write_state();
        self.write_metrics().record_failure();
        let now = Instant::now();

        match state.circuit {
            CircuitState::Closed => {
                state.failure_count += 1;
                state.last_failure_at = Some(now);
                if state.failure_count >= self.config.failure_threshold {
                    state.open(now);
                    self.write_metrics().record_opened();
                    tracing::warn!(
                        dependency = %self.name,
                        failures = state.failure_count,
                        recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                        "Circuit opened"
                    );
                    audit::emit_breaker_transition(
                        &self.name,
                        CircuitState::Closed,
                        CircuitState::Open,
                    );
                }
            }

            CircuitState::HalfOpen => {
                // Any failure during probation reopens the circuit
                state.failure_count += 1;
                state.open(now);
                self.write_metrics().record_opened();
                tracing::warn!(dependency = %self.name, "Probe failed, circuit reopened");
                audit::emit_breaker_transition(
                    &self.name,
                    CircuitState::HalfOpen,
                    CircuitState::Open,
                );
            }

            CircuitState::Open => {
                // Already open, nothing to do
            }
        }
    }

    /// Records a failed call, consulting the failure policy.
    ///
    /// Failures the policy does not count release any probe slot the call held.
    pub fn record_outcome(&self, error: &ResilienceError) {
        if self.config.failure_policy.should_count(error) {
            self.record_failure();
        } else {
            self.release_probe();
        }
    }

    /// Returns an unused half-open probe slot, e.g. after a cancelled call.
    ///
    /// Prefer dropping the [`ProbePermit`] from [`guard`](Self::guard),
    /// which only releases a slot from the half-open period that granted it.
    pub fn release_probe(&self) {
        let mut state = self.write_state();
        Self::release_slot(&mut state);
    }

    fn release_probe_from(&self, generation: u64) {
        let mut state = self.write_state();
        if state.probe_generation == generation {
            Self::release_slot(&mut state);
        }
    }

    fn release_slot(state: &mut BreakerState) {
        if state.is_half_open() && state.half_open_admitted > state.half_open_calls {
            state.half_open_admitted -= 1;
        }
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self) {
        let mut state = self.write_state();
        let previous = state.circuit;
        state.failure_count = state.failure_count.max(self.config.failure_threshold);
        state.open(Instant::now());
        self.write_metrics().record_opened();
        audit::emit_breaker_transition(&self.name, previous, CircuitState::Open);
    }

    /// Forces the circuit into the closed state.
    pub fn force_close(&self) {
        let mut state = self.write_state();
        let previous = state.circuit;
        state.close();
        self.write_metrics().record_closed();
        audit::emit_breaker_transition(&self.name, previous, CircuitState::Closed);
    }

    /// Resets the circuit breaker state and metrics.
    pub fn reset(&self) {
        self.write_state().close();
        *self.write_metrics() = BreakerMetrics::new();
    }

    /// Returns a copy of the current metrics.
    pub fn metrics(&self) -> BreakerMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.read_state().failure_count
    }

    /// Returns the number of successful half-open probes.
    pub fn half_open_calls(&self) -> u32 {
        self.read_state().half_open_calls
    }

    /// Returns a snapshot without performing the lazy state transition.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.read_state();
        BreakerSnapshot {
            name: self.name.clone(),
            state: state.circuit,
            failure_count: state.failure_count,
            half_open_calls: state.half_open_calls,
            last_failure_ms_ago: state
                .last_failure_at
                .map(|at| at.elapsed().as_millis() as u64),
            metrics: self.metrics(),
        }
    }

    /// Returns the time left before an open circuit admits probes.
    pub fn remaining_open_time(&self) -> Option<Duration> {
        let state = self.read_state();
        if !state.is_open() {
            return None;
        }
        state
            .last_failure_at
            .map(|at| self.config.recovery_timeout.saturating_sub(at.elapsed()))
    }

    /// Performs the lazy Open to Half-Open transition when due.
    fn refresh(&self, state: &mut BreakerState, now: Instant) {
        if !state.is_open() {
            return;
        }
        let elapsed = state
            .last_failure_at
            .map(|at| now.duration_since(at))
            .unwrap_or(self.config.recovery_timeout);
        if elapsed >= self.config.recovery_timeout {
            state.half_open();
            tracing::debug!(dependency = %self.name, "Circuit half-open, admitting probes");
            audit::emit_breaker_transition(&self.name, CircuitState::Open, CircuitState::HalfOpen);
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, BreakerState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BreakerState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metrics(&self) -> RwLockWriteGuard<'_, BreakerMetrics> {
        self.metrics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &*self.read_state())
            .field("config", &self.config)
            .finish()
    }
}

/// Admission granted by [`CircuitBreaker::guard`].
///
/// While the circuit is half-open the permit owns one probe slot. Settling
/// the permit records the call's outcome; dropping it unsettled returns the
/// slot, so an abandoned call never keeps the circuit from recovering.
#[must_use = "dropping a permit releases its probe slot without recording an outcome"]
pub struct ProbePermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Half-open period the held slot belongs to.
    probe: Option<u64>,
}

impl<'a> ProbePermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: Option<u64>) -> Self {
        Self { breaker, probe }
    }

    /// Returns `true` if this permit holds a half-open probe slot.
    pub fn is_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Records a successful call.
    pub fn success(mut self) {
        self.probe = None;
        self.breaker.record_success();
    }

    /// Records a failed call, consulting the failure policy.
    ///
    /// Failures the policy does not count give the probe slot back.
    pub fn failure(mut self, error: &ResilienceError) {
        let probe = self.probe.take();
        if self.breaker.config.failure_policy.should_count(error) {
            self.breaker.record_failure();
        } else if let Some(generation) = probe {
            self.breaker.release_probe_from(generation);
        }
    }
}

impl Drop for ProbePermit<'_> {
    fn drop(&mut self) {
        if let Some(generation) = self.probe.take() {
            tracing::debug!(dependency = %self.breaker.name, "Probe abandoned, releasing slot");
            self.breaker.release_probe_from(generation);
        }
    }
}

impl fmt::Debug for ProbePermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbePermit")
            .field("dependency", &self.breaker.name)
            .field("probe", &self.probe)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use std::sync::Arc;

    fn breaker(threshold: u32, recovery: Duration, probes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-dependency",
            CircuitBreakerConfig::default()
                .with_failure_threshold(threshold)
                .with_recovery_timeout(recovery)
                .with_half_open_max_calls(probes),
        )
    }

    #[test]
    fn test_starts_closed_and_available() {
        let breaker = CircuitBreaker::with_defaults("moz");
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.is_available());
        assert!(breaker.guard().is_ok());
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let breaker = breaker(3, Duration::from_secs(60), 1);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_available());

        breaker.record_failure();
        assert!(!breaker.is_available());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.metrics().times_opened, 1);
        assert!(breaker.remaining_open_time().is_some());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60), 1);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_rejection_is_not_a_failure() {
        let breaker = breaker(1, Duration::from_secs(60), 1);
        breaker.record_failure();

        let err = breaker.guard().unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(err.dependency(), Some("test-dependency"));
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(breaker.metrics().rejected_requests, 1);
        assert_eq!(breaker.metrics().failed_requests, 1);
    }

    #[test]
    fn test_lazy_transition_to_half_open() {
        let breaker = breaker(1, Duration::from_millis(20), 2);
        breaker.record_failure();
        assert!(!breaker.is_available());

        std::thread::sleep(Duration::from_millis(30));

        // The snapshot does not perform the transition
        assert_eq!(breaker.snapshot().state, CircuitState::Open);
        assert!(breaker.is_available());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_admits_limited_probes() {
        let breaker = breaker(1, Duration::from_millis(10), 2);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        let first = breaker.guard().unwrap();
        let second = breaker.guard().unwrap();
        assert!(first.is_probe());
        assert!(breaker.guard().is_err());
        assert!(!breaker.is_available());

        // Releasing an abandoned probe frees its slot
        drop(second);
        assert!(breaker.is_available());
        first.success();
        assert_eq!(breaker.half_open_calls(), 1);
    }

    #[test]
    fn test_dropped_permit_does_not_wedge_half_open() {
        let breaker = breaker(1, Duration::from_millis(10), 1);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        let permit = breaker.guard().unwrap();
        assert!(!breaker.is_available());
        drop(permit);

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.is_available());
        breaker.guard().unwrap().success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_permit_leaves_later_period_alone() {
        let breaker = breaker(1, Duration::from_millis(10), 2);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        let stale = breaker.guard().unwrap();
        breaker
            .guard()
            .unwrap()
            .failure(&ResilienceError::transient("test-dependency", FailureKind::Connect, "refused"));
        assert_eq!(breaker.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));

        let _a = breaker.guard().unwrap();
        let _b = breaker.guard().unwrap();
        drop(stale);
        assert!(!breaker.is_available());
    }

    #[test]
    fn test_uncounted_failure_returns_slot() {
        let breaker = breaker(1, Duration::from_millis(10), 1);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        breaker
            .guard()
            .unwrap()
            .failure(&ResilienceError::cancelled("test-dependency"));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.is_available());
    }

    #[test]
    fn test_closed_permit_holds_no_slot() {
        let breaker = CircuitBreaker::with_defaults("moz");
        let permit = breaker.guard().unwrap();
        assert!(!permit.is_probe());
        permit.success();
        assert_eq!(breaker.metrics().successful_requests, 1);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = breaker(2, Duration::from_millis(10), 3);
        breaker.record_failure();
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_available());
        assert!(breaker.failure_count() >= breaker.config().failure_threshold);
        assert_eq!(breaker.metrics().times_opened, 2);
    }

    #[test]
    fn test_half_open_successes_close() {
        let breaker = breaker(1, Duration::from_millis(10), 2);
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.half_open_calls(), 1);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.metrics().times_closed, 1);
    }

    #[test]
    fn test_record_outcome_respects_policy() {
        let breaker = breaker(1, Duration::from_secs(60), 1);
        breaker.record_outcome(&ResilienceError::cancelled("test-dependency"));
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_outcome(&ResilienceError::transient(
            "test-dependency",
            FailureKind::Connect,
            "refused",
        ));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_force_open_close() {
        let breaker = CircuitBreaker::with_defaults("moz");
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.failure_count() >= breaker.config().failure_threshold);

        breaker.force_close();
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.reset();
        assert_eq!(breaker.metrics(), BreakerMetrics::new());
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let breaker = Arc::new(breaker(1_000, Duration::from_secs(60), 1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        breaker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.failure_count(), 400);
        assert_eq!(breaker.metrics().failed_requests, 400);
    }
}
