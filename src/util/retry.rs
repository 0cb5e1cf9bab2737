//! Poll a fallible async operation with exponential backoff.
//!
//! The identity service never pushes "session ready"; callers poll it. This
//! module owns the loop (attempt, wait, attempt again) so that callers only
//! decide what a single attempt means.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Backoff {
    /// Delay to wait after attempt number `retry` (0-based) fails:
    /// `base_delay * multiplier^retry`, capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }
}

/// Result of one polled attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T, E> {
    /// The operation produced its value.
    Ready(T),
    /// Not there yet; retry if budget remains. Carries the error, if any.
    NotYet(Option<E>),
}

/// A value obtained after `retries` retries.
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T> {
    pub value: T,
    pub retries: u32,
}

/// Why polling stopped without a value.
#[derive(Debug, Clone, PartialEq)]
pub enum PollError<E> {
    /// Every retry was spent. `retries` equals the policy's `max_retries`.
    Exhausted { retries: u32, last_error: Option<E> },
    Cancelled,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Poll `operation` until it is ready, runs out of retries, or `cancel`
    /// fires.
    ///
    /// `operation` receives the current retry number (0 for the first attempt).
    /// `on_wait` is called with the upcoming retry number and the delay right
    /// before each wait. Cancellation drops an in-flight attempt and any
    /// pending delay.
    pub async fn poll<F, Fut, T, E, W>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
        mut on_wait: W,
    ) -> Result<Polled<T>, PollError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        W: FnMut(u32, Duration),
    {
        let mut retry = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                outcome = operation(retry) => outcome,
            };

            let last_error = match outcome {
                Attempt::Ready(value) => {
                    return Ok(Polled {
                        value,
                        retries: retry,
                    })
                }
                Attempt::NotYet(error) => error,
            };

            if retry >= self.max_retries {
                return Err(PollError::Exhausted {
                    retries: retry,
                    last_error,
                });
            }

            let delay = self.backoff.delay_for(retry);
            tracing::debug!(
                retry = retry + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Attempt not ready, backing off"
            );
            on_wait(retry + 1, delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            retry += 1;
        }
    }
}
