//! Client-side key/value persistence.
//!
//! Two scopes back the OAuth flow: a session scope that only has to survive
//! the provider redirect round-trip, and a durable scope that survives full
//! reloads. Key names match the ones the web frontend already writes.

mod file;

pub use file::{FileStore, FileStoreConfig};

use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LandingError, Result};

/// Storage key names.
pub mod keys {
    /// Session scope: `"true"` while an OAuth round-trip is in flight.
    pub const AUTH_IN_PROGRESS: &str = "googleAuthInProgress";
    /// Session scope: epoch milliseconds after which the in-flight marker is stale.
    pub const AUTH_EXPIRY_TIME: &str = "googleAuthExpiryTime";
    /// Session scope: JSON `BrowserProfile` captured before the redirect.
    pub const BROWSER_INFO: &str = "authBrowserInfo";
    /// Durable scope: JSON `{"timestamp": ms, "count": n}`.
    pub const AUTH_ATTEMPTS: &str = "googleAuthAttempts";
    /// Durable scope: id of the last confirmed user.
    pub const USER_ID: &str = "userId";
}

/// Storage abstraction for persisted client state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read a JSON value. A value that fails to parse is treated as absent.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(key, error = %err, "Ignoring corrupt persisted value");
            Ok(None)
        }
    }
}

/// Write a JSON value.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// In-memory store; backs the session scope.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| LandingError::Storage("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
