//! Retry and backoff.
//!
//! [`RetryPolicy`] decides whether a failed attempt may be retried and how
//! long to wait first. [`retry_async`] drives an async operation through a
//! policy and honors cancellation during the backoff sleep.
//!
//! Attempts are zero-indexed: with `max_retries = 3` an operation is tried at
//! most four times.

mod executor;
mod policy;

pub use executor::retry_async;
pub use policy::{parse_retry_after, RetryPolicy};
