//! oauth-landing: confirm an OAuth sign-in after the provider redirect.
//!
//! The provider sends the browser back to a landing route, but the session it
//! created is not always visible yet. iOS and Safari in particular lag behind
//! and sometimes hide the session cookie entirely. This crate classifies the
//! browser, picks a retry/backoff policy for it and polls the identity service
//! until both the session and the user's profile are visible, under a global
//! per-device attempt limit.
//!
//! # Quick Start
//!
//! ```no_run
//! use oauth_landing::prelude::*;
//!
//! # async fn example() -> oauth_landing::error::Result<()> {
//! let context = LandingContext::from_config(LandingConfig::from_env()?)?;
//! let browser = context
//!     .flow()?
//!     .landing_profile("Mozilla/5.0 ...", &ClientHints::default())?;
//! let outcome = context.machine_for(browser).run().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod browser;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod policy;
pub mod prelude;
pub mod storage;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
