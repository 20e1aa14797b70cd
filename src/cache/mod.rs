//! Response caching.
//!
//! The resilient client treats the cache as opaque key-value storage with
//! expiry. [`ResponseCache`] is the collaborator interface; [`InMemoryCache`]
//! is a process-local implementation backed by a sharded map, so writes to
//! unrelated keys never contend.

mod key;
mod memory;
mod traits;

pub use key::make_key;
pub use memory::{CacheEntry, InMemoryCache};
pub use traits::{NoOpCache, ResponseCache};
