//! In-memory response cache.

use crate::cache::traits::ResponseCache;
use crate::core::CacheError;

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Writes between opportunistic purges of expired entries.
const DEFAULT_PURGE_EVERY: usize = 64;

/// A cached payload and its expiry time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Stored bytes.
    pub payload: Vec<u8>,
    /// When the entry stops being served.
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Returns `true` if the entry has expired at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A process-local cache.
///
/// Expired entries are evicted lazily on read, swept every
/// `purge_every` writes, or eagerly with
/// [`purge_expired`](Self::purge_expired). Keys that are never read again
/// therefore do not outlive their TTL by more than one sweep.
#[derive(Debug)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    writes: AtomicUsize,
    purge_every: usize,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            writes: AtomicUsize::new(0),
            purge_every: DEFAULT_PURGE_EVERY,
        }
    }
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many writes pass between sweeps of expired entries.
    ///
    /// A value of zero is treated as one, sweeping on every write.
    pub fn with_purge_every(mut self, writes: usize) -> Self {
        self.purge_every = writes.max(1);
        self
    }

    /// Returns the number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.payload.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheError::new(format!("ttl {ttl:?} is out of range")))?;
        self.entries
            .insert(key.to_string(), CacheEntry { payload, expires_at });

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % self.purge_every == 0 {
            let purged = self.purge_expired();
            if purged > 0 {
                tracing::trace!(purged, remaining = self.entries.len(), "Purged expired cache entries");
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
