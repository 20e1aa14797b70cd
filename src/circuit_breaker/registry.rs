//! Registry of circuit breakers keyed by dependency name.

use crate::circuit_breaker::breaker::CircuitBreaker;
use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::BreakerSnapshot;

use dashmap::DashMap;
use std::sync::Arc;

/// Shared, process-wide set of circuit breakers.
///
/// Breakers are created lazily on first use. Per-dependency configuration
/// overrides take effect for breakers created after they are registered.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: DashMap<String, CircuitBreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Creates a registry whose breakers use `default_config` unless overridden.
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            overrides: DashMap::new(),
            breakers: DashMap::new(),
        }
    }

    /// Registers a configuration override for one dependency.
    pub fn with_config(self, name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Returns the breaker for `name`, if one has been created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let breaker = self
            .breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(name)
                    .map(|entry| entry.value().clone())
                    .unwrap_or_else(|| self.default_config.clone());
                tracing::debug!(dependency = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(name, config))
            });
        Arc::clone(breaker.value())
    }

    /// Returns snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Resets every breaker to closed.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Returns the number of breakers created so far.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Returns `true` if no breaker has been created.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
