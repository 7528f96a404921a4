//! Async testing utilities.
//!
//! Timeout wrappers, polling, and a [`Recorder`] for collecting values
//! reported through callbacks.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default timeout for async operations in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval used by [`wait_until`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Run a future with a timeout.
///
/// # Panics
///
/// Panics if the future does not complete within the timeout.
pub async fn with_timeout<T, F>(timeout: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Test timed out")
}

/// Run a future with [`DEFAULT_TIMEOUT`].
pub async fn with_default_timeout<T, F>(future: F) -> T
where
    F: Future<Output = T>,
{
    with_timeout(DEFAULT_TIMEOUT, future).await
}

/// Wait for a condition to become true.
///
/// Uses tokio's clock, so it also works under a paused runtime.
///
/// # Panics
///
/// Panics if the condition is not met within the timeout.
pub async fn wait_for<F>(timeout: Duration, interval: Duration, mut condition: F)
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while !condition() {
        assert!(
            start.elapsed() <= timeout,
            "Condition not met within timeout"
        );
        tokio::time::sleep(interval).await;
    }
}

/// [`wait_for`] with [`DEFAULT_TIMEOUT`] and [`POLL_INTERVAL`].
pub async fn wait_until<F>(condition: F)
where
    F: FnMut() -> bool,
{
    wait_for(DEFAULT_TIMEOUT, POLL_INTERVAL, condition).await;
}

/// Collects values from callbacks, cheaply cloneable into closures.
///
/// ```rust
/// use afd_testing::Recorder;
///
/// let attempts = Recorder::new();
/// let sink = attempts.clone();
/// let on_attempt = move |n: u32| sink.record(n);
/// on_attempt(1);
/// on_attempt(2);
/// assert_eq!(attempts.values(), vec![1, 2]);
/// ```
#[derive(Debug)]
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            values: Arc::default(),
        }
    }
}

impl<T: Clone> Recorder<T> {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value.
    pub fn record(&self, value: T) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value);
    }

    /// Recorded values, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent value.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}
