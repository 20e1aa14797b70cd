//! Async retry loop.

use crate::core::ResilienceError;
use crate::retry::policy::RetryPolicy;

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Executes an async operation with retry logic.
///
/// The operation receives the zero-indexed attempt number. A retryable
/// failure is retried after the policy's delay until `max_retries` is spent,
/// at which point the last failure is wrapped in
/// [`ResilienceError::ExhaustedRetries`]. Non-retryable failures are returned
/// unchanged. Cancelling `cancel` aborts the backoff sleep and stops further
/// attempts.
pub async fn retry_async<T, F, Fut>(
    policy: &RetryPolicy,
    dependency: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ResilienceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ResilienceError>>,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ResilienceError::cancelled(dependency));
        }

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !policy.is_retryable(&error) {
            return Err(error);
        }
        if !policy.should_retry(attempt, &error) {
            tracing::debug!(
                dependency = %dependency,
                attempts = attempt + 1,
                error = %error,
                "Retries exhausted"
            );
            return Err(ResilienceError::ExhaustedRetries {
                dependency: dependency.to_string(),
                attempts: attempt + 1,
                last: Box::new(error),
            });
        }

        let delay = policy.delay_for_failure(attempt, &error);
        tracing::debug!(
            dependency = %dependency,
            attempt = attempt,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying operation"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(ResilienceError::cancelled(dependency)),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(retries)
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_async(&fast_policy(3), "moz", &CancellationToken::new(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ResilienceError::transient("moz", FailureKind::Timeout, "slow"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_async(&fast_policy(2), "moz", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ResilienceError::transient("moz", FailureKind::Connect, "refused")) }
            })
            .await;

        match result.unwrap_err() {
            ResilienceError::ExhaustedRetries { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.failure_kind(), Some(FailureKind::Connect));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_async(&fast_policy(3), "moz", &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ResilienceError::permanent("moz", "HTTP 404", Some(404))) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_during_backoff() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(30))
            .with_jitter(false);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = retry_async(&policy, "moz", &cancel, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ResilienceError::transient("moz", FailureKind::Timeout, "slow")) }
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
