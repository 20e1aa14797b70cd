//! Cache collaborator trait.

use crate::core::CacheError;

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Key-value storage with per-entry expiry.
///
/// Payloads are opaque bytes. Implementations must be safe for concurrent
/// use and should scope any locking to a single key.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use brandscope::cache::ResponseCache;
/// use brandscope::core::CacheError;
/// use async_trait::async_trait;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct RedisCache {
///     // Connection pool
/// }
///
/// #[async_trait]
/// impl ResponseCache for RedisCache {
///     async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
///         // GET key
///         todo!()
///     }
///
///     async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
///         // SET key payload EX ttl
///         todo!()
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), CacheError> {
///         // DEL key
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait ResponseCache: Send + Sync + Debug {
    /// Returns the payload stored under `key`, unless absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `payload` under `key` for `ttl`.
    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the entry stored under `key`.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

#[async_trait]
impl ResponseCache for NoOpCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _payload: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}
