//! Fixed-schedule retry executor.
//!
//! The feed endpoint is retried on a fixed backoff table rather than
//! exponential backoff: the schedule (default 30s then 120s, three
//! attempts total) matches the cadence the LMS operations team expects
//! between hammering attempts. Only transient errors are retried;
//! permanent ones surface immediately.

use std::time::Duration;
use tracing::debug;

use crate::error::{FeedError, FeedResult};

/// Retry executor with a fixed delay table.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    /// Create a schedule from a delay table. An empty table means a
    /// single attempt with no retries.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Build from delay seconds, as carried in feed configuration.
    #[must_use]
    pub fn from_secs(delays_secs: &[u64]) -> Self {
        Self::new(delays_secs.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    /// Total number of attempts the schedule permits.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.delays.len() as u32 + 1
    }

    /// Execute an operation, sleeping between transient failures.
    ///
    /// Exhausting the schedule yields [`FeedError::RetriesExhausted`]
    /// wrapping the last failure. Permanent errors are returned as-is
    /// from whichever attempt produced them.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> FeedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = FeedResult<T>>,
    {
        let mut last_error = None;

        for (attempt, delay) in self
            .delays
            .iter()
            .map(Some)
            .chain(std::iter::once(None))
            .enumerate()
        {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    if let Some(delay) = delay {
                        debug!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts(),
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "Retrying after transient feed error"
                        );
                        last_error = Some(e);
                        tokio::time::sleep(*delay).await;
                    } else {
                        last_error = Some(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(FeedError::RetriesExhausted {
            attempts: self.max_attempts(),
            last: Box::new(last_error.unwrap_or_else(|| FeedError::connection("no attempt made"))),
        })
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::from_secs(&[30, 120])
    }
}
