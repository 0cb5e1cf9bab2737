//! Utility modules: retry polling, timeout, wall clock.

pub mod clock;
pub mod retry;
pub mod timeout;
