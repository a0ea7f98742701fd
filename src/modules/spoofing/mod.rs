//! Browser identity spoofing.
//!
//! Samples an internally consistent browser fingerprint (user agent, device
//! geometry, language, cookies) and renders it as the header set a real
//! browser would send to the target site.

pub mod pools;

use http::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, COOKIE, ORIGIN, PRAGMA,
    REFERER, USER_AGENT,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;

use crate::modules::random::SharedRng;

pub use pools::{DESKTOP_MIN_WIDTH, MOBILE_MAX_WIDTH, classify_user_agent, classify_width};

pub const DEFAULT_REFERER: &str = "https://app.prizepicks.com/";
pub const DEFAULT_ORIGIN: &str = "https://app.prizepicks.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProfile {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceProfile {
    pub const ALL: [DeviceProfile; 3] = [
        DeviceProfile::Desktop,
        DeviceProfile::Mobile,
        DeviceProfile::Tablet,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Android,
    Ios,
    Linux,
    Windows,
}

impl Platform {
    /// Platform implied by the user agent.
    pub fn detect(user_agent: &str) -> Self {
        if user_agent.contains("Macintosh") {
            Platform::MacOs
        } else if user_agent.contains("Android") {
            Platform::Android
        } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
            Platform::Ios
        } else if user_agent.contains("Linux") {
            Platform::Linux
        } else {
            Platform::Windows
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::MacOs => "macOS",
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserFamily {
    Edge,
    Chrome,
    Firefox,
    Safari,
    Other,
}

impl BrowserFamily {
    /// Edge is checked first since its agents also carry the Chrome token.
    pub fn detect(user_agent: &str) -> Self {
        if user_agent.contains("Edg/") || user_agent.contains("EdgA/") {
            BrowserFamily::Edge
        } else if user_agent.contains("Chrome") || user_agent.contains("CriOS") {
            BrowserFamily::Chrome
        } else if user_agent.contains("Firefox") || user_agent.contains("FxiOS") {
            BrowserFamily::Firefox
        } else if user_agent.contains("Safari") {
            BrowserFamily::Safari
        } else {
            BrowserFamily::Other
        }
    }
}

/// Whether the agent advertises a handheld device.
pub fn is_mobile_agent(user_agent: &str) -> bool {
    user_agent.contains("Mobile") || user_agent.contains("Android")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

/// One sampled fingerprint plus its rendered headers.
#[derive(Debug, Clone)]
pub struct BrowserIdentity {
    pub profile: DeviceProfile,
    pub user_agent: &'static str,
    pub browser: BrowserFamily,
    pub platform: Platform,
    pub mobile: bool,
    pub viewport: Viewport,
    pub screen_resolution: (u16, u16),
    pub accept_language: &'static str,
    pub cookies: Vec<&'static str>,
    pub sec_ch_ua: Option<String>,
    pub headers: HeaderMap,
}

impl BrowserIdentity {
    pub fn cookie_header(&self) -> String {
        self.cookies.join("; ")
    }
}

/// Generates randomized browser identities from the static pools.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    rng: SharedRng,
    referer: HeaderValue,
    origin: HeaderValue,
}

impl IdentityGenerator {
    pub fn new(rng: SharedRng) -> Self {
        Self {
            rng,
            referer: HeaderValue::from_static(DEFAULT_REFERER),
            origin: HeaderValue::from_static(DEFAULT_ORIGIN),
        }
    }

    /// Overrides the `Referer`/`Origin` pair presented to the target site.
    pub fn with_site(mut self, referer: HeaderValue, origin: HeaderValue) -> Self {
        self.referer = referer;
        self.origin = origin;
        self
    }

    /// Samples an identity for `profile`, or for a uniformly chosen class.
    pub fn generate(&self, profile: Option<DeviceProfile>) -> BrowserIdentity {
        let profile = profile.unwrap_or_else(|| {
            self.rng
                .choose(&DeviceProfile::ALL)
                .copied()
                .unwrap_or(DeviceProfile::Desktop)
        });
        let pool = pools::pool_for(profile);

        let user_agent = self.pick(&pool.user_agents, pools::USER_AGENT_FALLBACK);
        let (width, height) = self.pick(&pool.viewports, (1920, 1080));
        let screen_resolution = self.pick(&pool.screen_resolutions, (1920, 1080));
        let accept_language = self.pick(pools::LANGUAGE_PREFERENCES, "en-US,en;q=0.9");

        let cookies = self.sample_cookies();

        let browser = BrowserFamily::detect(user_agent);
        let platform = Platform::detect(user_agent);
        let mobile = is_mobile_agent(user_agent);
        let sec_ch_ua = self.client_hint_brands(browser);

        let mut identity = BrowserIdentity {
            profile,
            user_agent,
            browser,
            platform,
            mobile,
            viewport: Viewport { width, height },
            screen_resolution,
            accept_language,
            cookies,
            sec_ch_ua,
            headers: HeaderMap::new(),
        };
        identity.headers = self.render_headers(&identity);
        identity
    }

    fn pick<T: Copy>(&self, items: &[T], fallback: T) -> T {
        self.rng.choose(items).copied().unwrap_or(fallback)
    }

    fn sample_cookies(&self) -> Vec<&'static str> {
        let mut cookies = Vec::new();
        for (index, group) in pools::COOKIE_GROUPS.iter().enumerate() {
            if index > 0 && self.rng.range_u64(0..=1) == 0 {
                continue;
            }
            if let Some(cookie) = self.rng.choose(*group) {
                cookies.push(*cookie);
            }
        }
        cookies
    }

    fn client_hint_brands(&self, browser: BrowserFamily) -> Option<String> {
        match browser {
            BrowserFamily::Edge => Some(format!(
                "\"Microsoft Edge\";v=\"{}\", \"Chromium\";v=\"{}\"",
                self.rng.range_u64(110..=120),
                self.rng.range_u64(110..=120)
            )),
            BrowserFamily::Chrome => Some(format!(
                "\"Google Chrome\";v=\"{}\", \"Chromium\";v=\"{}\"",
                self.rng.range_u64(110..=120),
                self.rng.range_u64(110..=120)
            )),
            BrowserFamily::Firefox => {
                Some(format!("\"Firefox\";v=\"{}\"", self.rng.range_u64(105..=115)))
            }
            BrowserFamily::Safari => {
                Some(format!("\"Safari\";v=\"{}\"", self.rng.range_u64(15..=17)))
            }
            BrowserFamily::Other => None,
        }
    }

    fn render_headers(&self, identity: &BrowserIdentity) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(identity.accept_language));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate, br"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("empty"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("cors"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static("same-origin"),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            quoted(identity.platform.label()),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static(if identity.mobile { "?1" } else { "?0" }),
        );
        if let Some(brands) = identity
            .sec_ch_ua
            .as_deref()
            .and_then(|b| HeaderValue::from_str(b).ok())
        {
            headers.insert(HeaderName::from_static("sec-ch-ua"), brands);
        }
        headers.insert(
            HeaderName::from_static("viewport-width"),
            HeaderValue::from(identity.viewport.width),
        );
        let (screen_width, screen_height) = identity.screen_resolution;
        if let Ok(size) = HeaderValue::from_str(&format!("{screen_width}x{screen_height}")) {
            headers.insert(HeaderName::from_static("x-screen-size"), size);
        }
        headers.insert(REFERER, self.referer.clone());
        headers.insert(ORIGIN, self.origin.clone());
        if let Ok(cookie) = HeaderValue::from_str(&identity.cookie_header()) {
            headers.insert(COOKIE, cookie);
        }
        headers
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new(SharedRng::default())
    }
}

fn quoted(value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("\"{value}\"")).unwrap_or_else(|_| HeaderValue::from_static("\"\""))
}
