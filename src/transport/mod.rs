//! Outbound HTTP transport.
//!
//! The resilient client never talks to the network directly; it performs
//! requests through a [`Transport`]. Failures are classified here into
//! connect, timeout and other transport failures, while HTTP statuses are
//! returned as ordinary responses and classified by the client.

mod mock;
mod types;

#[cfg(feature = "http")]
mod http;

pub use mock::MockTransport;
pub use types::{HttpMethod, HttpRequest, HttpResponse, TransportError};

#[cfg(feature = "http")]
pub use http::ReqwestTransport;

use async_trait::async_trait;
use std::fmt::Debug;

/// Performs a single HTTP exchange.
///
/// Implementations must not retry; retrying is the resilient client's job.
/// The request's `timeout`, when set, bounds the whole exchange.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Performs the request.
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
