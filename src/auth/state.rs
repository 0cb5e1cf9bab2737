use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{FailureKind, RecoverySuggestion, TerminalErrorKind};
use crate::identity::Profile;

/// States of one confirmation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ConfirmationState {
    Idle,
    CheckingSession,
    CheckingUser,
    RetryWaiting,
    Confirmed,
    Failed,
    Blocked,
}

impl ConfirmationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Blocked)
    }
}

/// Observable record of the running cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthAttemptState {
    pub state: ConfirmationState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub seconds_until_next_retry: Option<u64>,
    pub session_confirmed: bool,
    pub user_confirmed: bool,
    /// The profile lookup ran without a verified session.
    pub unverified_session: bool,
    pub terminal_error: Option<TerminalErrorKind>,
}

impl AuthAttemptState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: ConfirmationState::Idle,
            retry_count: 0,
            max_retries,
            seconds_until_next_retry: None,
            session_confirmed: false,
            user_confirmed: false,
            unverified_session: false,
            terminal_error: None,
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    /// Identity confirmed; navigate to `destination`.
    Confirmed {
        profile: Profile,
        retry_count: u32,
        unverified_session: bool,
        destination: String,
    },
    /// Retries exhausted or hard timeout hit.
    Failed {
        error: TerminalErrorKind,
        retry_count: u32,
        suggestion: RecoverySuggestion,
    },
    /// Global attempt cap already reached; redirect after a short pause.
    Blocked {
        redirect_after: Duration,
        destination: String,
    },
    /// The owning view was torn down mid-cycle.
    Cancelled { retry_count: u32 },
}

impl ConfirmationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { .. } => Some(FailureKind::RetriesExhausted),
            Self::Blocked { .. } => Some(FailureKind::GlobalRateLimited),
            Self::Confirmed { .. } | Self::Cancelled { .. } => None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            Self::Confirmed { retry_count, .. }
            | Self::Failed { retry_count, .. }
            | Self::Cancelled { retry_count } => *retry_count,
            Self::Blocked { .. } => 0,
        }
    }
}
