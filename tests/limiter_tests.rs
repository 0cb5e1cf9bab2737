//! Global attempt limiter over durable stores.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use oauth_landing::auth::{AttemptLimiter, LimiterSettings};
use oauth_landing::storage::{keys, FileStore, FileStoreConfig, KeyValueStore, MemoryStore};
use oauth_landing::util::clock::ManualClock;

const WINDOW: Duration = Duration::from_secs(10 * 60);

fn limiter(store: Arc<dyn KeyValueStore>, clock: &ManualClock) -> AttemptLimiter {
    AttemptLimiter::new(store, Arc::new(clock.clone()), LimiterSettings::default())
}

#[test]
fn default_cap_allows_five_attempts_then_blocks() {
    let clock = ManualClock::new(1_000);
    let limiter = limiter(Arc::new(MemoryStore::new()), &clock);

    for attempt in 1..=5 {
        assert!(limiter.record_attempt().unwrap(), "attempt {attempt}");
    }
    assert!(!limiter.record_attempt().unwrap());
    assert!(limiter.status().unwrap().is_blocked());
}

#[test]
fn counter_survives_reload_from_disk() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(1_000);
    let open = || -> Arc<dyn KeyValueStore> {
        Arc::new(FileStore::new(FileStoreConfig::new(dir.path().to_path_buf())))
    };

    for _ in 0..3 {
        limiter(open(), &clock).record_attempt().unwrap();
    }

    let status = limiter(open(), &clock).status().unwrap();
    assert_eq!(status.attempts_in_window, 3);
    assert_eq!(status.remaining(), 2);
    assert_eq!(status.window_expires_at_ms, Some(1_000 + WINDOW.as_millis() as i64));
}

#[test]
fn window_expiry_resets_to_one() {
    let clock = ManualClock::new(0);
    let store = Arc::new(MemoryStore::new());
    let limiter = limiter(store.clone(), &clock);
    for _ in 0..6 {
        limiter.record_attempt().unwrap();
    }

    clock.advance(WINDOW + Duration::from_millis(1));
    assert!(limiter.record_attempt().unwrap());
    assert_eq!(limiter.status().unwrap().attempts_in_window, 1);
}

#[test]
fn reset_on_success_is_idempotent() {
    let clock = ManualClock::new(0);
    let store = Arc::new(MemoryStore::new());
    let limiter = limiter(store.clone(), &clock);
    limiter.record_attempt().unwrap();

    limiter.reset_on_success().unwrap();
    limiter.reset_on_success().unwrap();

    assert_eq!(store.get(keys::AUTH_ATTEMPTS).unwrap(), None);
    assert_eq!(limiter.status().unwrap().attempts_in_window, 0);
}

#[test]
fn concurrent_recorders_never_lose_an_increment() {
    let clock = ManualClock::new(0);
    let limiter = Arc::new(AttemptLimiter::new(
        Arc::new(MemoryStore::new()),
        Arc::new(clock),
        LimiterSettings {
            max_attempts_per_window: 1_000,
            window: WINDOW,
        },
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = limiter.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    limiter.record_attempt().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(limiter.status().unwrap().attempts_in_window, 200);
}

#[test]
fn reset_then_record_behaves_like_a_fresh_window() {
    let clock = ManualClock::new(0);
    let used = limiter(Arc::new(MemoryStore::new()), &clock);
    for _ in 0..7 {
        used.record_attempt().unwrap();
    }
    clock.advance(Duration::from_secs(30));
    used.reset_on_success().unwrap();

    let fresh = limiter(Arc::new(MemoryStore::new()), &clock);
    for _ in 0..6 {
        assert_eq!(used.record_attempt().unwrap(), fresh.record_attempt().unwrap());
    }
    assert_eq!(used.status().unwrap(), fresh.status().unwrap());
}

#[test]
fn blocked_calls_keep_the_original_window() {
    let clock = ManualClock::new(5_000);
    let limiter = limiter(Arc::new(MemoryStore::new()), &clock);
    for _ in 0..5 {
        limiter.record_attempt().unwrap();
    }
    clock.advance(Duration::from_secs(60));
    assert!(!limiter.record_attempt().unwrap());
    assert_eq!(
        limiter.status().unwrap().window_expires_at_ms,
        Some(5_000 + WINDOW.as_millis() as i64)
    );
}
