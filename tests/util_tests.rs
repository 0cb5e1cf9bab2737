//! Tests for utility modules (retry polling, timeout, clock).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use oauth_landing::util::clock::{Clock, ManualClock};
use oauth_landing::util::retry::{Attempt, Backoff, PollError, Polled, RetryPolicy};
use oauth_landing::util::timeout::with_timeout;

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff: Backoff {
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(250),
        },
    }
}

#[tokio::test(start_paused = true)]
async fn poll_retries_until_ready() {
    let attempts = Arc::new(AtomicU32::new(0));
    let waits = Mutex::new(Vec::new());

    let result = policy(5)
        .poll(
            &CancellationToken::new(),
            |retry| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if retry < 2 {
                        Attempt::NotYet(Some("not yet"))
                    } else {
                        Attempt::Ready("ok")
                    }
                }
            },
            |next, delay| waits.lock().unwrap().push((next, delay)),
        )
        .await;

    assert_eq!(
        result,
        Ok(Polled {
            value: "ok",
            retries: 2
        })
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        *waits.lock().unwrap(),
        vec![
            (1, Duration::from_millis(100)),
            (2, Duration::from_millis(200)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn poll_exhausts_after_exactly_max_retries() {
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<Polled<()>, _> = policy(3)
        .poll(
            &CancellationToken::new(),
            |retry| {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Attempt::NotYet(Some(format!("failure {retry}")))
                }
            },
            |_, _| {},
        )
        .await;

    assert_eq!(
        result,
        Err(PollError::Exhausted {
            retries: 3,
            last_error: Some("failure 3".to_string()),
        })
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn poll_cancellation_drops_pending_delay() {
    let cancel = CancellationToken::new();
    let attempts = Arc::new(AtomicU32::new(0));
    let canceller = cancel.clone();

    let retry = policy(10);
    let poll = retry.poll(
        &cancel,
        |_| {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Attempt::<(), &str>::NotYet(None)
            }
        },
        |_, _| {},
    );
    let (result, ()) = tokio::join!(poll, async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    assert_eq!(result, Err(PollError::Cancelled));
    // Attempts at 0ms and 100ms; the 200ms wait was cut short.
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn with_timeout_reports_the_deadline() {
    let err = with_timeout(Duration::from_secs(2), std::future::pending::<()>())
        .await
        .unwrap_err();
    assert_eq!(err.after, Duration::from_secs(2));
}

#[test]
fn manual_clock_clones_share_time() {
    let clock = ManualClock::new(10);
    let other = clock.clone();
    clock.advance(Duration::from_millis(5));
    assert_eq!(other.now_millis(), 15);
    other.set(100);
    assert_eq!(clock.now_millis(), 100);
}
