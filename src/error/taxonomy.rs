//! Failure taxonomy and terminal error classification.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad failure category for routing retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FailureKind {
    /// Transport failure; retried.
    TransientNetwork,
    /// The identity service does not see the session yet; retried.
    SessionNotYetVisible,
    /// Retry ceiling reached; terminal.
    RetriesExhausted,
    /// Global attempt cap reached before any network call; terminal.
    GlobalRateLimited,
    /// The application's identity context never initialized; terminal.
    ContextUnavailable,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientNetwork | Self::SessionNotYetVisible)
    }
}

/// Stable tag attached to a failed confirmation, consumed by remediation UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TerminalErrorKind {
    CookieBlocked,
    TrackingPrevention,
    Timeout,
    General,
}

/// Provider codes that mean the session cookie never reached the API.
const COOKIE_CODES: &[&str] = &["general_unauthorized_scope", "user_session_not_found"];

const COOKIE_MARKERS: &[&str] = &["cookie", "third-party", "third party"];

const TRACKING_MARKERS: &[&str] = &[
    "tracking",
    "intelligent tracking",
    "storage access",
    "privacy",
    "blocked by client",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "time out", "deadline"];

impl TerminalErrorKind {
    /// Heuristically classify an error message and optional provider code.
    ///
    /// Cookie markers win over tracking markers, which win over timeouts.
    pub fn classify(message: &str, code: Option<&str>) -> Self {
        let message = message.to_ascii_lowercase();
        let code = code.map(str::to_ascii_lowercase);

        let mentions = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

        if mentions(COOKIE_MARKERS)
            || code.as_deref().is_some_and(|c| COOKIE_CODES.contains(&c))
        {
            Self::CookieBlocked
        } else if mentions(TRACKING_MARKERS) {
            Self::TrackingPrevention
        } else if mentions(TIMEOUT_MARKERS) {
            Self::Timeout
        } else {
            Self::General
        }
    }

    pub fn recovery_suggestion(self) -> RecoverySuggestion {
        match self {
            Self::CookieBlocked => RecoverySuggestion::EnableCookies,
            Self::TrackingPrevention => RecoverySuggestion::DisableTrackingPrevention,
            Self::Timeout => RecoverySuggestion::RetryLater,
            Self::General => RecoverySuggestion::RetryOrContinue,
        }
    }
}

/// Suggested remediation shown next to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RecoverySuggestion {
    EnableCookies,
    DisableTrackingPrevention,
    RetryLater,
    RetryOrContinue,
    WaitForCooldown,
    ReloadApplication,
}

impl From<FailureKind> for RecoverySuggestion {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::GlobalRateLimited => Self::WaitForCooldown,
            FailureKind::ContextUnavailable => Self::ReloadApplication,
            FailureKind::TransientNetwork => Self::RetryLater,
            FailureKind::SessionNotYetVisible | FailureKind::RetriesExhausted => {
                Self::RetryOrContinue
            }
        }
    }
}
