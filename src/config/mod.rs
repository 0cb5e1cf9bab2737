//! Configuration (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::limiter::{LimiterSettings, DEFAULT_MAX_ATTEMPTS_PER_WINDOW, DEFAULT_WINDOW};
use crate::error::{LandingError, Result};
use crate::storage::FileStoreConfig;

const ENV_PREFIX: &str = "OAUTH_LANDING_";

const DEFAULT_PROFILE_COLLECTION: &str = "databases/main/collections/profiles";
const DEFAULT_SUCCESS_URL: &str = "http://localhost:3000/auth/google/success";
const DEFAULT_FAILURE_URL: &str = "http://localhost:3000/login?error=oauth";
const DEFAULT_LANDING_DESTINATION: &str = "/";
const DEFAULT_BLOCKED_REDIRECT_DELAY_MS: u64 = 3_000;
const DEFAULT_MARKER_TTL_SECS: u64 = 10 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Settings for the landing flow and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct LandingConfig {
    /// Identity API base URL, e.g. `https://cloud.example.com/v1`.
    #[builder(into)]
    pub endpoint: Option<String>,
    #[builder(into)]
    pub project_id: Option<String>,
    #[builder(into, default = DEFAULT_PROFILE_COLLECTION.to_string())]
    pub profile_collection: String,
    /// Durable store directory. `None` means `~/.oauth-landing`.
    pub storage_dir: Option<PathBuf>,
    #[builder(default = DEFAULT_MAX_ATTEMPTS_PER_WINDOW)]
    pub max_attempts_per_window: u32,
    #[builder(default = DEFAULT_WINDOW.as_secs())]
    pub window_secs: u64,
    #[builder(into, default = DEFAULT_SUCCESS_URL.to_string())]
    pub success_url: String,
    #[builder(into, default = DEFAULT_FAILURE_URL.to_string())]
    pub failure_url: String,
    #[builder(into, default = DEFAULT_LANDING_DESTINATION.to_string())]
    pub landing_destination: String,
    #[builder(default = DEFAULT_BLOCKED_REDIRECT_DELAY_MS)]
    pub blocked_redirect_delay_ms: u64,
    #[builder(default = DEFAULT_MARKER_TTL_SECS)]
    pub oauth_marker_ttl_secs: u64,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl LandingConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LandingError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overlaid with `.env` and `OAUTH_LANDING_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay `.env` and process environment on top of `self`.
    pub fn with_env(self) -> Result<Self> {
        let _ = dotenvy::dotenv(); // .env is optional
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Overlay variables resolved by `lookup` (names include the prefix).
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(endpoint) = var("ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Some(project_id) = var("PROJECT_ID") {
            self.project_id = Some(project_id);
        }
        if let Some(collection) = var("PROFILE_COLLECTION") {
            self.profile_collection = collection;
        }
        if let Some(dir) = var("STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = var("MAX_ATTEMPTS") {
            self.max_attempts_per_window = parse_number("MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = var("WINDOW_SECS") {
            self.window_secs = parse_number("WINDOW_SECS", &raw)?;
        }
        if let Some(url) = var("SUCCESS_URL") {
            self.success_url = url;
        }
        if let Some(url) = var("FAILURE_URL") {
            self.failure_url = url;
        }
        Ok(self)
    }

    pub fn limiter_settings(&self) -> LimiterSettings {
        LimiterSettings {
            max_attempts_per_window: self.max_attempts_per_window,
            window: Duration::from_secs(self.window_secs),
        }
    }

    pub fn storage(&self) -> FileStoreConfig {
        match &self.storage_dir {
            Some(dir) => FileStoreConfig::new(dir.clone()),
            None => FileStoreConfig::new(FileStoreConfig::default_dir()),
        }
    }

    pub fn blocked_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.blocked_redirect_delay_ms)
    }

    pub fn oauth_marker_ttl(&self) -> Duration {
        Duration::from_secs(self.oauth_marker_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(suffix: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| {
        LandingError::Configuration(format!("{ENV_PREFIX}{suffix}={raw:?} is not valid: {e}"))
    })
}
