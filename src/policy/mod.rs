//! Browser-specific confirmation timing.
//!
//! The whole tunable surface lives in [`STANDARD_RULES`] and
//! [`DEFAULT_POLICY`]: plain data, matched top to bottom against a
//! [`BrowserProfile`].

use std::time::Duration;

use crate::browser::BrowserProfile;
use crate::util::retry::{Backoff, RetryPolicy};

/// Extra waits applied around the session check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseDelays {
    /// Once, before the first session check (cookie settling after the redirect).
    pub initial: Duration,
    /// Before the secondary account check on enhanced-flow browsers.
    pub pre_check: Duration,
    /// Between a confirmed session and the profile lookup.
    pub post_confirmation: Duration,
}

impl PhaseDelays {
    pub const NONE: Self = Self {
        initial: Duration::ZERO,
        pre_check: Duration::ZERO,
        post_confirmation: Duration::ZERO,
    };
}

/// Timing and trust parameters for one confirmation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPolicy {
    /// Rule name, for logs and the CLI.
    pub name: &'static str,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub phase_delays: PhaseDelays,
    /// Wall-clock ceiling for the whole cycle, even if a call never settles.
    pub hard_timeout: Duration,
    /// A session alone is not trusted; the account call must also succeed.
    pub require_account_confirmation: bool,
    /// Once this many retries have failed to verify a session, proceed to the
    /// profile lookup anyway.
    ///
    /// Trades correctness for usability on browsers whose session visibility
    /// after a redirect is known to be unreliable. `None` disables it.
    pub unverified_session_fallback_after_retries: Option<u32>,
}

impl ConfirmationPolicy {
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base_delay: self.base_delay,
            multiplier: self.backoff_multiplier,
            max_delay: self.max_delay,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: self.backoff(),
        }
    }

    /// Delay before retry `retry + 1`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff().delay_for(retry)
    }

    /// Whether an unverified session may be treated as confirmed at this retry count.
    pub fn allows_unverified_session(&self, retry_count: u32) -> bool {
        self.unverified_session_fallback_after_retries
            .is_some_and(|threshold| retry_count >= threshold)
    }
}

/// Applies when no rule matches: moderate retries, short delays.
pub const DEFAULT_POLICY: ConfirmationPolicy = ConfirmationPolicy {
    name: "default",
    max_retries: 3,
    base_delay: Duration::from_millis(500),
    backoff_multiplier: 2.0,
    max_delay: Duration::from_millis(4_000),
    phase_delays: PhaseDelays {
        initial: Duration::from_millis(300),
        pre_check: Duration::ZERO,
        post_confirmation: Duration::ZERO,
    },
    hard_timeout: Duration::from_secs(30),
    require_account_confirmation: false,
    unverified_session_fallback_after_retries: None,
};

const IOS_SAFARI_POLICY: ConfirmationPolicy = ConfirmationPolicy {
    name: "ios-safari",
    max_retries: 6,
    base_delay: Duration::from_millis(1_500),
    backoff_multiplier: 1.5,
    max_delay: Duration::from_millis(10_000),
    phase_delays: PhaseDelays {
        initial: Duration::from_millis(2_000),
        pre_check: Duration::from_millis(1_000),
        post_confirmation: Duration::from_millis(1_000),
    },
    hard_timeout: Duration::from_secs(60),
    require_account_confirmation: true,
    unverified_session_fallback_after_retries: Some(2),
};

const IOS_POLICY: ConfirmationPolicy = ConfirmationPolicy {
    name: "ios",
    max_retries: 6,
    base_delay: Duration::from_millis(1_500),
    backoff_multiplier: 1.5,
    max_delay: Duration::from_millis(10_000),
    phase_delays: PhaseDelays {
        initial: Duration::from_millis(1_500),
        pre_check: Duration::from_millis(800),
        post_confirmation: Duration::from_millis(800),
    },
    hard_timeout: Duration::from_secs(60),
    require_account_confirmation: true,
    unverified_session_fallback_after_retries: None,
};

const DESKTOP_SAFARI_POLICY: ConfirmationPolicy = ConfirmationPolicy {
    name: "desktop-safari",
    max_retries: 5,
    base_delay: Duration::from_millis(1_000),
    backoff_multiplier: 1.5,
    max_delay: Duration::from_millis(8_000),
    phase_delays: PhaseDelays {
        initial: Duration::from_millis(1_000),
        pre_check: Duration::from_millis(500),
        post_confirmation: Duration::from_millis(500),
    },
    hard_timeout: Duration::from_secs(45),
    require_account_confirmation: true,
    unverified_session_fallback_after_retries: Some(2),
};

const MOBILE_FIREFOX_POLICY: ConfirmationPolicy = ConfirmationPolicy {
    name: "mobile-firefox",
    max_retries: 5,
    base_delay: Duration::from_millis(1_000),
    backoff_multiplier: 1.5,
    max_delay: Duration::from_millis(8_000),
    phase_delays: PhaseDelays {
        initial: Duration::from_millis(800),
        pre_check: Duration::from_millis(500),
        post_confirmation: Duration::from_millis(300),
    },
    hard_timeout: Duration::from_secs(45),
    require_account_confirmation: true,
    unverified_session_fallback_after_retries: None,
};

/// A predicate over a profile paired with the policy it selects.
#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub name: &'static str,
    pub applies: fn(&BrowserProfile) -> bool,
    pub policy: ConfirmationPolicy,
}

fn is_ios_safari(profile: &BrowserProfile) -> bool {
    profile.is_ios && profile.is_mobile_safari
}

fn is_ios(profile: &BrowserProfile) -> bool {
    profile.is_ios
}

fn is_desktop_safari(profile: &BrowserProfile) -> bool {
    profile.is_desktop_safari
}

fn is_mobile_firefox(profile: &BrowserProfile) -> bool {
    profile.is_mobile_firefox
}

/// Built-in rules, most specific first.
pub const STANDARD_RULES: &[PolicyRule] = &[
    PolicyRule {
        name: "ios-safari",
        applies: is_ios_safari,
        policy: IOS_SAFARI_POLICY,
    },
    PolicyRule {
        name: "ios",
        applies: is_ios,
        policy: IOS_POLICY,
    },
    PolicyRule {
        name: "desktop-safari",
        applies: is_desktop_safari,
        policy: DESKTOP_SAFARI_POLICY,
    },
    PolicyRule {
        name: "mobile-firefox",
        applies: is_mobile_firefox,
        policy: MOBILE_FIREFOX_POLICY,
    },
];

/// An ordered rule list plus the policy used when nothing matches.
#[derive(Debug, Clone, Copy)]
pub struct PolicyTable<'a> {
    pub rules: &'a [PolicyRule],
    pub fallback: &'a ConfirmationPolicy,
}

impl PolicyTable<'static> {
    pub const STANDARD: Self = Self {
        rules: STANDARD_RULES,
        fallback: &DEFAULT_POLICY,
    };
}

impl<'a> PolicyTable<'a> {
    pub fn select(&self, profile: &BrowserProfile) -> &'a ConfirmationPolicy {
        self.rules
            .iter()
            .find(|rule| (rule.applies)(profile))
            .map(|rule| &rule.policy)
            .unwrap_or(self.fallback)
    }
}

/// Pick the standard policy for a profile.
pub fn select_policy(profile: &BrowserProfile) -> &'static ConfirmationPolicy {
    PolicyTable::STANDARD.select(profile)
}
