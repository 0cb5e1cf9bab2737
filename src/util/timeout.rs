//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// A future did not settle before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Timed out after {}ms", .after.as_millis())]
pub struct TimedOut {
    pub after: Duration,
}

/// Wrap a future with a timeout.
pub async fn with_timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, TimedOut> {
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimedOut { after: duration })
}
