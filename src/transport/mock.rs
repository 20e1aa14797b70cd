//! Scripted transport for testing.

use crate::transport::types::{HttpRequest, HttpResponse, TransportError};
use crate::transport::Transport;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<HttpResponse, TransportError>;

/// A transport that replays scripted outcomes.
///
/// Scripted replies are consumed in FIFO order; once the script is empty
/// every request receives the fallback reply.
///
/// # Examples
///
/// ```rust
/// use brandscope::transport::{HttpResponse, MockTransport, TransportError};
///
/// let transport = MockTransport::new()
///     .push_error(TransportError::connect("refused"))
///     .push_response(HttpResponse::new(503))
///     .with_fallback_response(HttpResponse::json_body(&serde_json::json!({"ok": true})));
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    latency: Option<Duration>,
    calls: AtomicU64,
    requested_urls: Mutex<Vec<String>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a transport answering every request with `200 {}`.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(HttpResponse::json_body(&serde_json::json!({}))),
            latency: None,
            calls: AtomicU64::new(0),
            requested_urls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a transport failing every request with the given error.
    pub fn failing(error: TransportError) -> Self {
        Self::new().with_fallback_error(error)
    }

    /// Appends a scripted response.
    pub fn push_response(self, response: HttpResponse) -> Self {
        self.lock_script().push_back(Ok(response));
        self
    }

    /// Appends a scripted transport failure.
    pub fn push_error(self, error: TransportError) -> Self {
        self.lock_script().push_back(Err(error));
        self
    }

    /// Sets the reply used once the script is exhausted.
    pub fn with_fallback_response(mut self, response: HttpResponse) -> Self {
        self.fallback = Ok(response);
        self
    }

    /// Sets a failure used once the script is exhausted.
    pub fn with_fallback_error(mut self, error: TransportError) -> Self {
        self.fallback = Err(error);
        self
    }

    /// Sets simulated latency for every request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns the number of requests performed.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the URLs requested so far, in order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested_urls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Reply>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn perform(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_urls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.url.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.lock_script().pop_front();
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = MockTransport::new()
            .push_response(HttpResponse::new(503))
            .push_error(TransportError::timeout("slow"));
        let request = HttpRequest::get("https://api.example.com");

        assert_eq!(transport.perform(&request).await.unwrap().status, 503);
        assert_eq!(
            transport.perform(&request).await.unwrap_err().kind,
            FailureKind::Timeout
        );
        assert_eq!(transport.perform(&request).await.unwrap().status, 200);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requested_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_transport() {
        let transport = MockTransport::failing(TransportError::connect("refused"));
        let request = HttpRequest::get("https://api.example.com");
        assert!(transport.perform(&request).await.is_err());
        assert!(transport.perform(&request).await.is_err());
    }
}
