//! Convenience re-exports for common use.

pub use crate::auth::{
    AttemptLimiter, AuthAttemptState, AuthEvents, ConfirmationMachine, ConfirmationOutcome,
    ConfirmationState, LimiterSettings, OAuthFlow,
};
pub use crate::browser::{classify, BrowserName, BrowserProfile, ClientHints, OsName};
pub use crate::config::LandingConfig;
pub use crate::context::LandingContext;
pub use crate::error::{LandingError, Result, TerminalErrorKind};
pub use crate::identity::{IdentityService, Profile};
pub use crate::policy::{select_policy, ConfirmationPolicy};
