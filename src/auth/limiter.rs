//! Global OAuth attempt limiter.
//!
//! Caps how many confirmation cycles one client may start within a rolling
//! window, independent of any single cycle's own retries. The record is
//! persisted so the count survives full page reloads.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LandingError, Result};
use crate::storage::{keys, load_json, save_json, KeyValueStore};
use crate::util::clock::Clock;

pub const DEFAULT_MAX_ATTEMPTS_PER_WINDOW: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Persisted `{timestamp, count}` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(rename = "timestamp")]
    pub window_start_ms: i64,
    #[serde(rename = "count")]
    pub attempts_in_window: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    pub max_attempts_per_window: u32,
    pub window: Duration,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            max_attempts_per_window: DEFAULT_MAX_ATTEMPTS_PER_WINDOW,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Read-only view of the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptStatus {
    pub attempts_in_window: u32,
    pub max_attempts_per_window: u32,
    /// Epoch ms at which the current window expires, if one is open.
    pub window_expires_at_ms: Option<i64>,
}

impl AttemptStatus {
    pub fn is_blocked(&self) -> bool {
        self.attempts_in_window >= self.max_attempts_per_window
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts_per_window
            .saturating_sub(self.attempts_in_window)
    }
}

/// Rolling-window attempt counter over a durable store.
///
/// Construct one per application context and share it.
pub struct AttemptLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    settings: LimiterSettings,
    rmw: Mutex<()>,
}

impl AttemptLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, settings: LimiterSettings) -> Self {
        Self {
            store,
            clock,
            settings,
            rmw: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> LimiterSettings {
        self.settings
    }

    /// Count one attempt. Returns `false` once the count exceeds the cap.
    ///
    /// Read, reset-if-expired, increment and write happen in one synchronous
    /// block with no suspension point in between.
    pub fn record_attempt(&self) -> Result<bool> {
        let _guard = self.lock()?;
        let now = self.clock.now_millis();
        let mut record = self
            .current_record(now)?
            .unwrap_or(AttemptRecord {
                window_start_ms: now,
                attempts_in_window: 0,
            });
        record.attempts_in_window = record.attempts_in_window.saturating_add(1);
        save_json(self.store.as_ref(), keys::AUTH_ATTEMPTS, &record)?;

        let allowed = record.attempts_in_window <= self.settings.max_attempts_per_window;
        if allowed {
            tracing::debug!(
                attempts = record.attempts_in_window,
                max = self.settings.max_attempts_per_window,
                "OAuth attempt recorded"
            );
        } else {
            tracing::warn!(
                attempts = record.attempts_in_window,
                max = self.settings.max_attempts_per_window,
                "OAuth attempt cap exceeded"
            );
        }
        Ok(allowed)
    }

    /// Clear the counter after a successful sign-in.
    pub fn reset_on_success(&self) -> Result<()> {
        let _guard = self.lock()?;
        self.store.remove(keys::AUTH_ATTEMPTS)
    }

    pub fn status(&self) -> Result<AttemptStatus> {
        let now = self.clock.now_millis();
        let record = self.current_record(now)?;
        Ok(AttemptStatus {
            attempts_in_window: record.map_or(0, |r| r.attempts_in_window),
            max_attempts_per_window: self.settings.max_attempts_per_window,
            window_expires_at_ms: record
                .map(|r| r.window_start_ms + self.settings.window.as_millis() as i64),
        })
    }

    /// The persisted record, or `None` if absent, unreadable or expired.
    fn current_record(&self, now: i64) -> Result<Option<AttemptRecord>> {
        let record: Option<AttemptRecord> = load_json(self.store.as_ref(), keys::AUTH_ATTEMPTS)?;
        let window_ms = self.settings.window.as_millis() as i64;
        Ok(record.filter(|r| {
            let elapsed = now - r.window_start_ms;
            // A start in the future means the clock moved backwards; start over.
            (0..=window_ms).contains(&elapsed)
        }))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.rmw
            .lock()
            .map_err(|_| LandingError::Storage("attempt limiter lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for AttemptLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLimiter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::util::clock::ManualClock;

    fn limiter(max: u32, window_ms: u64) -> (Arc<MemoryStore>, ManualClock, AttemptLimiter) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(1_700_000_000_000);
        let limiter = AttemptLimiter::new(
            store.clone(),
            Arc::new(clock.clone()),
            LimiterSettings {
                max_attempts_per_window: max,
                window: Duration::from_millis(window_ms),
            },
        );
        (store, clock, limiter)
    }

    #[test]
    fn record_is_persisted_in_frontend_format() {
        let (store, _clock, limiter) = limiter(3, 60_000);
        limiter.record_attempt().unwrap();
        let raw = store.get(keys::AUTH_ATTEMPTS).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let (_store, clock, limiter) = limiter(1, 1_000);
        assert!(limiter.record_attempt().unwrap());
        clock.advance(Duration::from_millis(1_000));
        assert!(!limiter.record_attempt().unwrap());
    }

    #[test]
    fn backwards_clock_starts_a_new_window() {
        let (_store, clock, limiter) = limiter(1, 60_000);
        assert!(limiter.record_attempt().unwrap());
        clock.set(1_600_000_000_000);
        assert!(limiter.record_attempt().unwrap());
    }

    #[test]
    fn corrupt_record_counts_as_fresh_window() {
        let (store, _clock, limiter) = limiter(2, 60_000);
        store.set(keys::AUTH_ATTEMPTS, "garbage").unwrap();
        assert!(limiter.record_attempt().unwrap());
        assert_eq!(limiter.status().unwrap().attempts_in_window, 1);
    }

    #[test]
    fn status_does_not_increment() {
        let (_store, _clock, limiter) = limiter(2, 60_000);
        limiter.record_attempt().unwrap();
        let status = limiter.status().unwrap();
        assert_eq!(status.attempts_in_window, 1);
        assert_eq!(status.remaining(), 1);
        assert!(!status.is_blocked());
        assert_eq!(limiter.status().unwrap().attempts_in_window, 1);
    }
}
