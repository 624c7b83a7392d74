//! Exponential backoff for transient backend failures.

use crate::api::error::ErrorHandler;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Retry parameters for one kind of operation.
///
/// Different call sites tune these independently (chat sends use a longer
/// base delay than the generic default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay to wait after the failed attempt with index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        with_retry(operation, self.max_retries, self.base_delay).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

/// Runs `operation` up to `max_retries + 1` times.
///
/// Only errors classified as retryable by [`ErrorHandler::is_retryable`] are
/// retried. After the failed attempt `n` the call sleeps
/// `base_delay * 2^n`. The error returned is always the last one observed.
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    let policy = RetryPolicy::new(max_retries, base_delay);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !ErrorHandler::is_retryable(&err) || attempt >= max_retries {
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
