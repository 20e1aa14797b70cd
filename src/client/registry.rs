//! Process-owned registry of resilient clients.

use crate::cache::{InMemoryCache, ResponseCache};
use crate::circuit_breaker::{BreakerRegistry, BreakerSnapshot, CircuitBreakerConfig};
use crate::client::resilient::{ClientConfig, ResilientClient};
use crate::core::ResilienceError;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Builder for creating a `ResilienceRegistry`.
pub struct ResilienceRegistryBuilder {
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn ResponseCache>>,
    breaker_config: CircuitBreakerConfig,
    breaker_overrides: Vec<(String, CircuitBreakerConfig)>,
    retry_policy: RetryPolicy,
    retry_overrides: HashMap<String, RetryPolicy>,
    client_config: ClientConfig,
}

impl ResilienceRegistryBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            transport: None,
            cache: None,
            breaker_config: CircuitBreakerConfig::default(),
            breaker_overrides: Vec::new(),
            retry_policy: RetryPolicy::default(),
            retry_overrides: HashMap::new(),
            client_config: ClientConfig::default(),
        }
    }

    /// Sets the transport.
    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_arc_transport(Arc::new(transport))
    }

    /// Sets a transport wrapped in an Arc.
    pub fn with_arc_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the response cache. Defaults to an [`InMemoryCache`].
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the default circuit breaker configuration.
    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Overrides the circuit breaker configuration for one dependency.
    pub fn with_dependency_breaker(
        mut self,
        dependency: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.breaker_overrides.push((dependency.into(), config));
        self
    }

    /// Sets the default retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Overrides the retry policy for one dependency.
    pub fn with_dependency_retry(mut self, dependency: impl Into<String>, policy: RetryPolicy) -> Self {
        self.retry_overrides.insert(dependency.into(), policy);
        self
    }

    /// Sets the client configuration.
    pub fn with_client_config(mut self, config: ClientConfig) -> Self {
        self.client_config = config;
        self
    }

    /// Builds the registry.
    pub fn build(self) -> Result<ResilienceRegistry, ResilienceError> {
        let transport = self
            .transport
            .ok_or_else(|| ResilienceError::configuration("A transport is required"))?;

        let breakers = self
            .breaker_overrides
            .into_iter()
            .fold(BreakerRegistry::new(self.breaker_config), |registry, (name, config)| {
                registry.with_config(name, config)
            });

        Ok(ResilienceRegistry {
            breakers: Arc::new(breakers),
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(InMemoryCache::new())),
            transport,
            retry_policy: self.retry_policy,
            retry_overrides: self.retry_overrides,
            client_config: self.client_config,
            clients: DashMap::new(),
        })
    }
}

impl Default for ResilienceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the shared resilience state of a process.
///
/// Components receive the registry explicitly; tests create a fresh one per
/// case. Every client for a dependency shares that dependency's breaker and
/// the registry's cache.
pub struct ResilienceRegistry {
    breakers: Arc<BreakerRegistry>,
    cache: Arc<dyn ResponseCache>,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    retry_overrides: HashMap<String, RetryPolicy>,
    client_config: ClientConfig,
    clients: DashMap<String, Arc<ResilientClient>>,
}

impl ResilienceRegistry {
    /// Creates a new builder.
    pub fn builder() -> ResilienceRegistryBuilder {
        ResilienceRegistryBuilder::new()
    }

    /// Returns the client bound to `dependency`, creating it on first use.
    pub fn client(&self, dependency: &str) -> Arc<ResilientClient> {
        if let Some(existing) = self.clients.get(dependency) {
            return Arc::clone(existing.value());
        }
        let client = self
            .clients
            .entry(dependency.to_string())
            .or_insert_with(|| {
                let policy = self
                    .retry_overrides
                    .get(dependency)
                    .cloned()
                    .unwrap_or_else(|| self.retry_policy.clone());
                Arc::new(ResilientClient::new(
                    dependency,
                    self.breakers.get_or_create(dependency),
                    policy,
                    Arc::clone(&self.cache),
                    Arc::clone(&self.transport),
                    self.client_config.clone(),
                ))
            });
        Arc::clone(client.value())
    }

    /// Returns the breaker registry.
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<dyn ResponseCache> {
        &self.cache
    }

    /// Returns breaker snapshots for every dependency used so far.
    pub fn health(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }
}

impl std::fmt::Debug for ResilienceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceRegistry")
            .field("breakers", &self.breakers)
            .field("retry_policy", &self.retry_policy)
            .field("client_config", &self.client_config)
            .field("clients", &self.clients.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::transport::MockTransport;
    use std::time::Duration;

    #[test]
    fn test_transport_is_required() {
        let err = ResilienceRegistry::builder().build().unwrap_err();
        assert!(matches!(err, ResilienceError::Configuration { .. }));
    }

    #[test]
    fn test_clients_are_shared_per_dependency() {
        let registry = ResilienceRegistry::builder()
            .with_transport(MockTransport::new())
            .build()
            .unwrap();

        let a = registry.client("moz");
        let b = registry.client("moz");
        let c = registry.client("twitter");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(a.breaker(), c.breaker()));
        assert!(Arc::ptr_eq(
            a.breaker(),
            &registry.breakers().get_or_create("moz")
        ));
    }

    #[test]
    fn test_per_dependency_overrides() {
        let registry = ResilienceRegistry::builder()
            .with_transport(MockTransport::new())
            .with_dependency_retry("openai", RetryPolicy::no_retry())
            .with_dependency_breaker(
                "openai",
                CircuitBreakerConfig::default().with_failure_threshold(1),
            )
            .build()
            .unwrap();

        let openai = registry.client("openai");
        assert_eq!(openai.policy().max_retries, 0);
        assert_eq!(registry.client("moz").policy().max_retries, 3);

        openai.breaker().record_failure();
        assert_eq!(openai.breaker().state(), CircuitState::Open);
        assert_eq!(registry.health().len(), 2);
    }

    #[test]
    fn test_client_config_is_applied() {
        let registry = ResilienceRegistry::builder()
            .with_transport(MockTransport::new())
            .with_client_config(ClientConfig::new().with_cache_ttl(Duration::from_secs(5)))
            .build()
            .unwrap();
        assert_eq!(
            registry.client("moz").config().cache_ttl,
            Duration::from_secs(5)
        );
    }
}
