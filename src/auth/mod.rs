//! OAuth redirect start, landing confirmation and attempt limiting.

pub mod confirm;
pub mod events;
pub mod flow;
pub mod limiter;
pub mod oauth_url;
pub mod state;

pub use confirm::ConfirmationMachine;
pub use events::{AuthChanged, AuthEvents};
pub use flow::{clear_markers, OAuthFlow, OAuthStart};
pub use limiter::{AttemptLimiter, AttemptRecord, AttemptStatus, LimiterSettings};
pub use oauth_url::{OAuthState, OAuthUrlBuilder};
pub use state::{AuthAttemptState, ConfirmationOutcome, ConfirmationState};
