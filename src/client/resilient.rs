//! The resilient client.

use crate::cache::{make_key, ResponseCache};
use crate::circuit_breaker::CircuitBreaker;
use crate::core::{FailureKind, ResilienceError};
use crate::retry::{parse_retry_after, retry_async, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, Transport};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Configuration shared by resilient clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long cacheable responses are kept.
    pub cache_ttl: Duration,

    /// Timeout for a single attempt when the request does not set one.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache time-to-live.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// How to derive the cache key of a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRule {
    /// Key prefix, usually the dependency or endpoint name.
    pub prefix: String,
    /// Parameters that distinguish otherwise identical targets.
    pub params: Vec<(String, String)>,
}

impl CacheRule {
    /// Creates a rule with no extra parameters.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            params: Vec::new(),
        }
    }

    /// Adds a key parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// A request plus its caching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// The HTTP request.
    pub request: HttpRequest,
    /// Present only for idempotent reads whose responses may be cached.
    pub cache: Option<CacheRule>,
}

impl OutboundRequest {
    /// Creates an uncached request.
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            cache: None,
        }
    }

    /// Creates a cacheable request.
    pub fn cached(request: HttpRequest, rule: CacheRule) -> Self {
        Self {
            request,
            cache: Some(rule),
        }
    }

    /// Returns the cache key, if the request is cacheable.
    pub fn cache_key(&self) -> Option<String> {
        self.cache.as_ref().map(|rule| {
            let params: Vec<(&str, &str)> = rule
                .params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            make_key(&rule.prefix, &self.request.url, &params)
        })
    }
}

impl From<HttpRequest> for OutboundRequest {
    fn from(request: HttpRequest) -> Self {
        Self::new(request)
    }
}

/// Executes outbound calls to one dependency with caching, circuit breaking
/// and retries.
///
/// For a single logical request the number of transport calls is zero on a
/// cache hit and otherwise at most `max_retries + 1`.
pub struct ResilientClient {
    dependency: String,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    cache: Arc<dyn ResponseCache>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl ResilientClient {
    /// Creates a client bound to `breaker`.
    pub fn new(
        dependency: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
        cache: Arc<dyn ResponseCache>,
        transport: Arc<dyn Transport>,
        config: ClientConfig,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            breaker,
            policy,
            cache,
            transport,
            config,
        }
    }

    /// Returns the dependency name.
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Returns the dependency's circuit breaker.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Executes one logical request.
    ///
    /// 1. A cacheable request with a live cache entry returns it without
    ///    touching the breaker or the transport.
    /// 2. Each attempt is admitted by the breaker or fails fast with
    ///    [`ResilienceError::CircuitOpen`], which is never retried.
    /// 3. Transient failures are retried per the policy; the breaker is
    ///    re-checked before every attempt.
    /// 4. Successful cacheable responses are stored for `cache_ttl`.
    ///
    /// Cancelling `cancel` aborts the in-flight attempt and any pending
    /// backoff; no further attempts are made.
    pub async fn execute(
        &self,
        outbound: OutboundRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ResilienceError> {
        if outbound.cache.is_some() && !outbound.request.method.is_cacheable() {
            return Err(ResilienceError::configuration(format!(
                "{} requests to '{}' cannot be cached",
                outbound.request.method, self.dependency
            )));
        }

        let key = outbound.cache_key();
        if let Some(key) = &key {
            if let Some(response) = self.cached(key).await {
                tracing::debug!(dependency = %self.dependency, key = %key, "Cache hit");
                return Ok(response);
            }
        }

        let request = &outbound.request;
        let response = retry_async(&self.policy, &self.dependency, cancel, |attempt| {
            self.attempt(request, attempt, cancel)
        })
        .await?;

        if let Some(key) = &key {
            self.store(key, &response).await;
        }
        Ok(response)
    }

    /// Performs a cacheable GET and deserializes the JSON body.
    ///
    /// A body that does not deserialize is a permanent failure, and its cache
    /// entry is discarded.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, ResilienceError> {
        let rule = params
            .iter()
            .fold(CacheRule::new(&self.dependency), |rule, (name, value)| {
                rule.with_param(*name, *value)
            });
        let outbound = OutboundRequest::cached(HttpRequest::get(url), rule);
        let key = outbound.cache_key();

        let response = self.execute(outbound, cancel).await?;
        match response.json::<T>() {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Some(key) = key {
                    if let Err(err) = self.cache.remove(&key).await {
                        tracing::warn!(dependency = %self.dependency, error = %err, "Cache remove failed");
                    }
                }
                Err(ResilienceError::permanent(
                    &self.dependency,
                    format!("malformed response: {e}"),
                    Some(response.status),
                ))
            }
        }
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ResilienceError> {
        // Dropping the permit on any early exit hands a probe slot back
        let permit = self.breaker.guard()?;

        let timeout = request.timeout.unwrap_or(self.config.request_timeout);
        tracing::trace!(
            dependency = %self.dependency,
            attempt = attempt,
            method = %request.method,
            url = %request.url,
            "Attempting request"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResilienceError::cancelled(&self.dependency)),
            outcome = tokio::time::timeout(timeout, self.transport.perform(request)) => outcome,
        };

        let error = match outcome {
            Ok(Ok(response)) if response.is_success() => {
                permit.success();
                return Ok(response);
            }
            Ok(Ok(response)) => self.classify_status(&response),
            Ok(Err(e)) => ResilienceError::transient(&self.dependency, e.kind, e.message),
            Err(_) => ResilienceError::transient(
                &self.dependency,
                FailureKind::Timeout,
                format!("no response within {timeout:?}"),
            ),
        };

        permit.failure(&error);
        tracing::debug!(
            dependency = %self.dependency,
            attempt = attempt,
            error = %error,
            "Attempt failed"
        );
        Err(error)
    }

    fn classify_status(&self, response: &HttpResponse) -> ResilienceError {
        if self.policy.is_retryable_status(response.status) {
            ResilienceError::RetryableStatus {
                dependency: self.dependency.clone(),
                status: response.status,
                retry_after: response.header("retry-after").and_then(parse_retry_after),
            }
        } else {
            ResilienceError::permanent(
                &self.dependency,
                format!("HTTP {}", response.status),
                Some(response.status),
            )
        }
    }

    async fn cached(&self, key: &str) -> Option<HttpResponse> {
        let bytes = match self.cache.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                tracing::warn!(dependency = %self.dependency, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(dependency = %self.dependency, error = %e, "Discarding unreadable cache entry");
                if let Err(e) = self.cache.remove(key).await {
                    tracing::warn!(dependency = %self.dependency, error = %e, "Cache remove failed");
                }
                None
            }
        }
    }

    async fn store(&self, key: &str, response: &HttpResponse) {
        let payload = match serde_json::to_vec(response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(dependency = %self.dependency, error = %e, "Failed to encode response for cache");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, payload, self.config.cache_ttl).await {
            tracing::warn!(dependency = %self.dependency, error = %e, "Cache write failed");
        }
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("dependency", &self.dependency)
            .field("breaker", &self.breaker.snapshot().state)
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish()
    }
}
