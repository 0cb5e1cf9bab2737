//! Browser classification.
//!
//! The classifier is the only code that looks at raw user-agent strings.
//! Everything downstream (retry policy, OAuth URL building) works from a
//! [`BrowserProfile`].

mod classifier;

pub use classifier::classify;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Browser family, as far as cookie and redirect behavior is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BrowserName {
    Safari,
    Chrome,
    Firefox,
    Edge,
    Opera,
    SamsungInternet,
    /// Embedded web view of a native app (Facebook, Instagram, Android `wv`, bare WKWebView).
    InApp,
    Unknown,
}

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum OsName {
    #[serde(rename = "iOS")]
    #[strum(serialize = "iOS")]
    Ios,
    Android,
    #[serde(rename = "macOS")]
    #[strum(serialize = "macOS")]
    MacOs,
    Windows,
    #[serde(rename = "ChromeOS")]
    #[strum(serialize = "ChromeOS")]
    ChromeOs,
    Linux,
    Unknown,
}

/// Hints a page can read besides the user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHints {
    /// `navigator.platform`, e.g. `MacIntel`.
    pub platform: Option<String>,
    /// `navigator.maxTouchPoints`.
    pub max_touch_points: u32,
}

impl ClientHints {
    pub fn new(platform: impl Into<String>, max_touch_points: u32) -> Self {
        Self {
            platform: Some(platform.into()),
            max_touch_points,
        }
    }
}

/// Classification of the requesting client.
///
/// Computed once per page load and persisted (as camelCase JSON under
/// `authBrowserInfo`) so the landing page sees the same profile the start
/// page saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserProfile {
    #[serde(rename = "isIOS")]
    pub is_ios: bool,
    pub is_android: bool,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop_safari: bool,
    pub is_mobile_safari: bool,
    pub is_mobile_firefox: bool,
    pub is_mobile_chrome: bool,
    pub browser: BrowserName,
    pub os: OsName,
    pub version: String,
    /// Popup-based OAuth works (no popup blocking or storage partitioning in the way).
    pub supports_popup_auth: bool,
    /// Cookie visibility after a cross-site redirect is slow or unreliable.
    pub requires_enhanced_flow: bool,
}

impl BrowserProfile {
    pub fn is_safari(&self) -> bool {
        self.is_desktop_safari || self.is_mobile_safari
    }

    pub fn is_in_app(&self) -> bool {
        self.browser == BrowserName::InApp
    }
}
