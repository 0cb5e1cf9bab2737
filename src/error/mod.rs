//! Error types for oauth-landing.

pub mod taxonomy;

pub use taxonomy::{FailureKind, RecoverySuggestion, TerminalErrorKind};

use thiserror::Error;

use crate::util::timeout::TimedOut;

/// Failure reported by an identity collaborator (session, account or profile lookups).
///
/// These never escape the confirmation machine; they are folded into retry
/// decisions and, once retries run out, into a [`TerminalErrorKind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {message}")]
    Unauthorized {
        code: Option<String>,
        message: String,
    },

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl IdentityError {
    /// Provider error code (e.g. `general_unauthorized_scope`), when the service sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } | Self::Unauthorized { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Where this error sits in the failure taxonomy while retries remain.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network(_) | Self::Timeout(_) => FailureKind::TransientNetwork,
            Self::Api { status, .. } if *status == 429 || *status >= 500 => {
                FailureKind::TransientNetwork
            }
            _ => FailureKind::SessionNotYetVisible,
        }
    }

    /// Classify this error for user messaging once retries are exhausted.
    pub fn terminal_kind(&self) -> TerminalErrorKind {
        TerminalErrorKind::classify(&self.to_string(), self.code())
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(0)
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<TimedOut> for IdentityError {
    fn from(error: TimedOut) -> Self {
        Self::Timeout(error.after.as_millis() as u64)
    }
}

/// Primary error type for oauth-landing operations.
#[derive(Error, Debug)]
pub enum LandingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Identity service error: {0}")]
    Identity(#[from] IdentityError),

    #[error("A confirmation cycle is already running")]
    AlreadyRunning,

    #[error("Identity context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl LandingError {
    /// Taxonomy entry for errors that are themselves terminal conditions.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::ContextUnavailable(_) => Some(FailureKind::ContextUnavailable),
            Self::Identity(err) => Some(err.failure_kind()),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for LandingError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LandingError>;
