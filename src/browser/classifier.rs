use std::sync::LazyLock;

use regex::Regex;

use super::{BrowserName, BrowserProfile, ClientHints, OsName};

static IOS_DEVICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"iPhone|iPad|iPod").expect("iOS device regex must compile"));

static IN_APP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"FBAN|FBAV|FB_IAB|Instagram|Line/|Twitter|LinkedInApp|Snapchat|GSA/|; wv\)")
        .expect("in-app browser regex must compile")
});

static ANDROID_TABLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tablet").expect("tablet regex must compile"));

/// Ordered token table for non-iOS browsers. Earlier rows win, so browsers
/// that also advertise `Chrome/` or `Safari/` must come first.
static DESKTOP_TOKENS: &[(&str, BrowserName)] = &[
    ("Edg/", BrowserName::Edge),
    ("EdgA/", BrowserName::Edge),
    ("Edge/", BrowserName::Edge),
    ("OPR/", BrowserName::Opera),
    ("SamsungBrowser/", BrowserName::SamsungInternet),
    ("Firefox/", BrowserName::Firefox),
    ("Chrome/", BrowserName::Chrome),
    ("Chromium/", BrowserName::Chrome),
    ("Safari/", BrowserName::Safari),
];

/// Every iOS browser is WebKit underneath; they are told apart by their own token.
static IOS_TOKENS: &[(&str, BrowserName)] = &[
    ("CriOS/", BrowserName::Chrome),
    ("FxiOS/", BrowserName::Firefox),
    ("EdgiOS/", BrowserName::Edge),
    ("OPiOS/", BrowserName::Opera),
    ("OPT/", BrowserName::Opera),
];

static VERSION_RES: LazyLock<Vec<(BrowserName, Regex)>> = LazyLock::new(|| {
    [
        (BrowserName::Safari, r"Version/([\d.]+)"),
        (BrowserName::Chrome, r"(?:CriOS|Chrome|Chromium)/([\d.]+)"),
        (BrowserName::Firefox, r"(?:FxiOS|Firefox)/([\d.]+)"),
        (BrowserName::Edge, r"(?:EdgiOS|EdgA|Edg|Edge)/([\d.]+)"),
        (BrowserName::Opera, r"(?:OPR|OPiOS|OPT)/([\d.]+)"),
        (BrowserName::SamsungInternet, r"SamsungBrowser/([\d.]+)"),
        (BrowserName::InApp, r"(?:FBAV/|Instagram )([\d.]+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        (
            name,
            Regex::new(pattern).expect("browser version regex must compile"),
        )
    })
    .collect()
});

/// Classify a user agent plus page-level hints into a [`BrowserProfile`].
///
/// Pure and deterministic. iPadOS in desktop mode reports a Macintosh user
/// agent; it is recognized through `MacIntel` + touch points.
///
/// # Example
/// ```
/// use oauth_landing::browser::{classify, BrowserName, ClientHints};
///
/// let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 \
///           (KHTML, like Gecko) CriOS/123.0.6312.52 Mobile/15E148 Safari/604.1";
/// let profile = classify(ua, &ClientHints::default());
/// assert!(profile.is_ios);
/// assert_eq!(profile.browser, BrowserName::Chrome);
/// assert!(profile.requires_enhanced_flow);
/// ```
pub fn classify(user_agent: &str, hints: &ClientHints) -> BrowserProfile {
    let ua = user_agent.trim();

    let ipad_desktop_mode = ua.contains("Macintosh")
        && hints.max_touch_points > 1
        && hints
            .platform
            .as_deref()
            .map_or(true, |platform| platform == "MacIntel");
    let is_ios = IOS_DEVICE_RE.is_match(ua) || ipad_desktop_mode;
    let is_android = !is_ios && ua.contains("Android");

    let is_tablet = ua.contains("iPad")
        || ipad_desktop_mode
        || (is_android && (!ua.contains("Mobile") || ANDROID_TABLET_RE.is_match(ua)));
    let is_mobile = is_ios || is_android || ua.contains("Mobi");

    let os = detect_os(ua, is_ios, is_android);
    let browser = if is_ios {
        detect_ios_browser(ua)
    } else {
        detect_browser(ua)
    };
    let version = detect_version(ua, browser);

    let is_desktop_safari = browser == BrowserName::Safari && os == OsName::MacOs && !is_ios;
    let is_mobile_safari = is_ios && browser == BrowserName::Safari;
    let is_mobile_firefox = is_mobile && browser == BrowserName::Firefox;
    let is_mobile_chrome = is_mobile && browser == BrowserName::Chrome;

    let requires_enhanced_flow = is_ios || is_desktop_safari || is_mobile_firefox;
    let supports_popup_auth = !is_mobile && !is_desktop_safari && browser != BrowserName::InApp;

    BrowserProfile {
        is_ios,
        is_android,
        is_mobile,
        is_tablet,
        is_desktop_safari,
        is_mobile_safari,
        is_mobile_firefox,
        is_mobile_chrome,
        browser,
        os,
        version,
        supports_popup_auth,
        requires_enhanced_flow,
    }
}

fn detect_os(ua: &str, is_ios: bool, is_android: bool) -> OsName {
    if is_ios {
        OsName::Ios
    } else if is_android {
        OsName::Android
    } else if ua.contains("Windows") {
        OsName::Windows
    } else if ua.contains("CrOS") {
        OsName::ChromeOs
    } else if ua.contains("Macintosh") || ua.contains("Mac OS X") {
        OsName::MacOs
    } else if ua.contains("Linux") || ua.contains("X11") {
        OsName::Linux
    } else {
        OsName::Unknown
    }
}

fn detect_ios_browser(ua: &str) -> BrowserName {
    if IN_APP_RE.is_match(ua) {
        return BrowserName::InApp;
    }
    if let Some(name) = first_token(ua, IOS_TOKENS) {
        return name;
    }
    // Real Safari always sends both; a bare WKWebView omits them.
    if ua.contains("Safari/") && ua.contains("Version/") {
        BrowserName::Safari
    } else {
        BrowserName::InApp
    }
}

fn detect_browser(ua: &str) -> BrowserName {
    if IN_APP_RE.is_match(ua) {
        return BrowserName::InApp;
    }
    first_token(ua, DESKTOP_TOKENS).unwrap_or(BrowserName::Unknown)
}

fn first_token(ua: &str, table: &[(&str, BrowserName)]) -> Option<BrowserName> {
    table
        .iter()
        .find(|(token, _)| ua.contains(token))
        .map(|(_, name)| *name)
}

fn detect_version(ua: &str, browser: BrowserName) -> String {
    VERSION_RES
        .iter()
        .find(|(name, _)| *name == browser)
        .and_then(|(_, re)| re.captures(ua))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
