//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the analysis orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Timeout for a unit that does not declare its own.
    pub unit_timeout: Duration,

    /// Upper bound on the whole job.
    pub job_timeout: Duration,

    /// Number of units that must succeed for the job to complete.
    pub min_successes: usize,

    /// Weight of each unit's score in the composite score; missing units weigh 1.0.
    #[serde(default)]
    pub score_weights: HashMap<String, f64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            unit_timeout: Duration::from_secs(60),
            job_timeout: Duration::from_secs(300),
            min_successes: 1,
            score_weights: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default unit timeout.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Sets the global job timeout.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Sets the minimum number of successful units. Values below 1 are raised to 1.
    pub fn with_min_successes(mut self, count: usize) -> Self {
        self.min_successes = count.max(1);
        self
    }

    /// Sets the composite-score weight of one unit.
    pub fn with_score_weight(mut self, unit: impl Into<String>, weight: f64) -> Self {
        self.score_weights.insert(unit.into(), weight);
        self
    }

    /// Returns the weight of a unit's score.
    pub fn weight_of(&self, unit: &str) -> f64 {
        self.score_weights.get(unit).copied().unwrap_or(1.0)
    }
}
