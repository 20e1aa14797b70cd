//! Circuit breaker state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// The admission state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through normally.
    Closed,
    /// Calls are rejected.
    Open,
    /// A limited number of probe calls are admitted.
    HalfOpen,
}

impl CircuitState {
    /// Returns the name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The mutable state of a circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerState {
    /// Current circuit state.
    pub circuit: CircuitState,
    /// Consecutive failures observed while closed.
    pub failure_count: u32,
    /// When the most recent counted failure happened.
    pub last_failure_at: Option<Instant>,
    /// Successful probes while half-open.
    pub half_open_calls: u32,
    /// Probes admitted while half-open.
    pub half_open_admitted: u32,
    /// Number of half-open periods entered, used to match probe slots to
    /// the period that granted them.
    pub probe_generation: u64,
}

impl BreakerState {
    /// Creates a new closed state.
    pub fn closed() -> Self {
        Self {
            circuit: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            half_open_calls: 0,
            half_open_admitted: 0,
            probe_generation: 0,
        }
    }

    /// Returns `true` if the circuit is closed.
    pub fn is_closed(&self) -> bool {
        self.circuit == CircuitState::Closed
    }

    /// Returns `true` if the circuit is open.
    pub fn is_open(&self) -> bool {
        self.circuit == CircuitState::Open
    }

    /// Returns `true` if the circuit is half-open.
    pub fn is_half_open(&self) -> bool {
        self.circuit == CircuitState::HalfOpen
    }

    /// Opens the circuit, stamping the failure time.
    pub(crate) fn open(&mut self, now: Instant) {
        self.circuit = CircuitState::Open;
        self.last_failure_at = Some(now);
        self.half_open_calls = 0;
        self.half_open_admitted = 0;
    }

    /// Moves an open circuit to half-open.
    pub(crate) fn half_open(&mut self) {
        self.circuit = CircuitState::HalfOpen;
        self.half_open_calls = 0;
        self.half_open_admitted = 0;
        self.probe_generation = self.probe_generation.wrapping_add(1);
    }

    /// Closes the circuit, keeping the probe generation.
    pub(crate) fn close(&mut self) {
        *self = Self {
            probe_generation: self.probe_generation,
            ..Self::closed()
        };
    }
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Metrics about circuit breaker behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Total number of calls, including rejected ones.
    pub total_requests: u64,
    /// Number of successful calls.
    pub successful_requests: u64,
    /// Number of failed calls counted against the breaker.
    pub failed_requests: u64,
    /// Number of calls rejected because the circuit was open.
    pub rejected_requests: u64,
    /// Number of times the circuit has opened.
    pub times_opened: u64,
    /// Number of times the circuit has closed from half-open.
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Creates new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful call.
    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.successful_requests += 1;
    }

    /// Records a failed call.
    pub fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
    }

    /// Records a rejected call.
    pub fn record_rejected(&mut self) {
        self.total_requests += 1;
        self.rejected_requests += 1;
    }

    /// Records that the circuit opened.
    pub fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    /// Records that the circuit closed.
    pub fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Returns the success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Returns the failure rate (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}

/// A serializable point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Dependency name.
    pub name: String,
    /// Circuit state at the time of the snapshot.
    pub state: CircuitState,
    /// Consecutive failures.
    pub failure_count: u32,
    /// Successful half-open probes.
    pub half_open_calls: u32,
    /// Milliseconds since the last counted failure.
    pub last_failure_ms_ago: Option<u64>,
    /// Accumulated metrics.
    pub metrics: BreakerMetrics,
}
