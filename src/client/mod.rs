//! Resilient outbound calls.
//!
//! A [`ResilientClient`] is bound to one named dependency. Each call is
//! composed from plain pieces: a cache lookup, then a retry loop around an
//! attempt, where every attempt passes the dependency's circuit breaker
//! before reaching the transport.
//!
//! [`ResilienceRegistry`] owns the shared state (breakers, cache, transport)
//! and hands out one client per dependency name.

mod registry;
mod resilient;

pub use registry::{ResilienceRegistry, ResilienceRegistryBuilder};
pub use resilient::{CacheRule, ClientConfig, OutboundRequest, ResilientClient};
