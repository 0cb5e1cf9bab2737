//! Session-scoped markers around the provider redirect.
//!
//! The start page records that an OAuth round-trip is in flight and which
//! browser started it; the landing page reads that back so both sides of the
//! redirect agree on the browser profile.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use uuid::Uuid;

use super::oauth_url::OAuthUrlBuilder;
use crate::browser::{classify, BrowserProfile, ClientHints};
use crate::error::Result;
use crate::storage::{keys, load_json, save_json, KeyValueStore};
use crate::util::clock::Clock;

pub const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(10 * 60);

/// What the start page needs to redirect the user.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub url: Url,
    pub browser: BrowserProfile,
    pub expires_at_ms: i64,
}

/// Start and landing helpers over the session-scoped store.
pub struct OAuthFlow {
    session: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    urls: OAuthUrlBuilder,
    marker_ttl: Duration,
}

impl OAuthFlow {
    pub fn new(session: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, urls: OAuthUrlBuilder) -> Self {
        Self {
            session,
            clock,
            urls,
            marker_ttl: DEFAULT_MARKER_TTL,
        }
    }

    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    /// Classify the browser, persist the markers and build the provider URL.
    pub fn begin(&self, provider: &str, user_agent: &str, hints: &ClientHints) -> Result<OAuthStart> {
        let browser = classify(user_agent, hints);
        let url = self.urls.build(provider, &browser, Uuid::new_v4())?;
        let expires_at_ms = self.clock.now_millis() + self.marker_ttl.as_millis() as i64;

        save_json(self.session.as_ref(), keys::BROWSER_INFO, &browser)?;
        self.session.set(keys::AUTH_IN_PROGRESS, "true")?;
        self.session
            .set(keys::AUTH_EXPIRY_TIME, &expires_at_ms.to_string())?;

        tracing::info!(
            provider,
            browser = %browser.browser,
            os = %browser.os,
            enhanced = browser.requires_enhanced_flow,
            "OAuth redirect started"
        );
        Ok(OAuthStart {
            url,
            browser,
            expires_at_ms,
        })
    }

    /// Whether a round-trip is in flight and its marker has not expired.
    pub fn is_in_progress(&self) -> Result<bool> {
        if self.session.get(keys::AUTH_IN_PROGRESS)?.as_deref() != Some("true") {
            return Ok(false);
        }
        let expires_at = self
            .session
            .get(keys::AUTH_EXPIRY_TIME)?
            .and_then(|raw| raw.trim().parse::<i64>().ok());
        Ok(expires_at.is_some_and(|at| self.clock.now_millis() <= at))
    }

    /// The profile to use on the landing page: the one captured before the
    /// redirect while it is fresh, otherwise a new classification.
    pub fn landing_profile(&self, user_agent: &str, hints: &ClientHints) -> Result<BrowserProfile> {
        if self.is_in_progress()? {
            if let Some(stored) = load_json::<BrowserProfile>(self.session.as_ref(), keys::BROWSER_INFO)? {
                return Ok(stored);
            }
        }
        Ok(classify(user_agent, hints))
    }

    pub fn clear(&self) -> Result<()> {
        clear_markers(self.session.as_ref())
    }
}

/// Remove every session-scoped OAuth marker.
pub fn clear_markers(session: &dyn KeyValueStore) -> Result<()> {
    session.remove(keys::AUTH_IN_PROGRESS)?;
    session.remove(keys::AUTH_EXPIRY_TIME)?;
    session.remove(keys::BROWSER_INFO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserName;
    use crate::storage::MemoryStore;
    use crate::util::clock::ManualClock;

    const IOS_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
    const IOS_GSA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) GSA/310.0.621847607 Mobile/15E148 Safari/604.1";

    fn flow() -> (Arc<MemoryStore>, ManualClock, OAuthFlow) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(1_000_000);
        let urls = OAuthUrlBuilder::new(
            "https://id.example.com/v1",
            "proj",
            "https://app.example.com/auth/success",
            "https://app.example.com/login",
        );
        let flow = OAuthFlow::new(store.clone(), Arc::new(clock.clone()), urls)
            .with_marker_ttl(Duration::from_secs(60));
        (store, clock, flow)
    }

    #[test]
    fn begin_writes_markers() {
        let (store, _clock, flow) = flow();
        let start = flow.begin("google", IOS_SAFARI, &ClientHints::default()).unwrap();
        assert_eq!(start.expires_at_ms, 1_060_000);
        assert_eq!(store.get(keys::AUTH_IN_PROGRESS).unwrap().as_deref(), Some("true"));
        assert_eq!(store.get(keys::AUTH_EXPIRY_TIME).unwrap().as_deref(), Some("1060000"));
        let raw = store.get(keys::BROWSER_INFO).unwrap().unwrap();
        assert!(raw.contains("\"isIOS\":true"));
        assert!(flow.is_in_progress().unwrap());
    }

    #[test]
    fn landing_reuses_profile_captured_before_redirect() {
        let (_store, _clock, flow) = flow();
        flow.begin("google", IOS_SAFARI, &ClientHints::default()).unwrap();
        // The landing page may be opened by a different app on the same device.
        let profile = flow.landing_profile(IOS_GSA, &ClientHints::default()).unwrap();
        assert_eq!(profile.browser, BrowserName::Safari);
    }

    #[test]
    fn expired_marker_reclassifies() {
        let (_store, clock, flow) = flow();
        flow.begin("google", IOS_SAFARI, &ClientHints::default()).unwrap();
        clock.advance(Duration::from_secs(61));
        assert!(!flow.is_in_progress().unwrap());
        let profile = flow.landing_profile(IOS_GSA, &ClientHints::default()).unwrap();
        assert_eq!(profile.browser, BrowserName::InApp);
    }

    #[test]
    fn clear_removes_everything() {
        let (store, _clock, flow) = flow();
        flow.begin("google", IOS_SAFARI, &ClientHints::default()).unwrap();
        flow.clear().unwrap();
        assert_eq!(store.get(keys::AUTH_IN_PROGRESS).unwrap(), None);
        assert_eq!(store.get(keys::AUTH_EXPIRY_TIME).unwrap(), None);
        assert_eq!(store.get(keys::BROWSER_INFO).unwrap(), None);
    }
}
