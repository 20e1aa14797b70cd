//! Mock analyzer for testing.
//!
//! This module provides a configurable analyzer that can be used in tests
//! to simulate unit outcomes without calling any dependency.

use crate::core::{Analyzer, Subject, UnitError, UnitOutput};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a [`MockAnalyzer`] does when invoked.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return the output.
    Succeed(UnitOutput),
    /// Return an analysis failure with the reason.
    Fail(String),
    /// Panic with the message.
    Panic(String),
    /// Never finish unless cancelled.
    Hang,
}

/// A mock analyzer for testing purposes.
///
/// # Examples
///
/// ```rust
/// use brandscope::analyzers::MockAnalyzer;
/// use std::time::Duration;
///
/// let seo = MockAnalyzer::succeeding("seo", 72.0).with_latency(Duration::from_millis(5));
/// let social = MockAnalyzer::failing("social", "quota exceeded");
/// assert_eq!(seo.call_count(), 0);
/// ```
#[derive(Debug)]
pub struct MockAnalyzer {
    /// Name of this unit.
    name: String,
    /// Outcome of each run.
    behavior: MockBehavior,
    /// Simulated latency before the outcome.
    latency: Option<Duration>,
    /// Unit-specific timeout.
    timeout: Option<Duration>,
    /// Counter for runs.
    call_count: AtomicU64,
    /// Counter for runs that observed cancellation.
    cancelled_count: AtomicU64,
}

impl MockAnalyzer {
    /// Creates a mock analyzer with the given behavior.
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            latency: None,
            timeout: None,
            call_count: AtomicU64::new(0),
            cancelled_count: AtomicU64::new(0),
        }
    }

    /// Creates an analyzer that succeeds with a score.
    pub fn succeeding(name: impl Into<String>, score: f64) -> Self {
        Self::new(name, MockBehavior::Succeed(UnitOutput::scored(score)))
    }

    /// Creates an analyzer that fails with a reason.
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Fail(reason.into()))
    }

    /// Creates an analyzer that panics.
    pub fn panicking(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Panic("simulated panic".to_string()))
    }

    /// Creates an analyzer that never finishes on its own.
    pub fn hanging(name: impl Into<String>) -> Self {
        Self::new(name, MockBehavior::Hang)
    }

    /// Sets the simulated latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sets a unit-specific timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the number of runs started.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Returns the number of runs that stopped because of cancellation.
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled_count.load(Ordering::Relaxed)
    }

    async fn wait(&self, duration: Option<Duration>, cancel: &CancellationToken) -> Result<(), UnitError> {
        let sleep = async {
            match duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancelled_count.fetch_add(1, Ordering::Relaxed);
                Err(UnitError::cancelled(&self.name, "cancelled"))
            }
            _ = sleep => Ok(()),
        }
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        _subject: &Subject,
        cancel: &CancellationToken,
    ) -> Result<UnitOutput, UnitError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = self.latency {
            self.wait(Some(latency), cancel).await?;
        }

        match &self.behavior {
            MockBehavior::Succeed(output) => Ok(output.clone()),
            MockBehavior::Fail(reason) => Err(UnitError::new(&self.name, reason.clone())),
            MockBehavior::Panic(message) => panic!("{message}"),
            MockBehavior::Hang => {
                self.wait(None, cancel).await?;
                Err(UnitError::new(&self.name, "hang ended without cancellation"))
            }
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}
