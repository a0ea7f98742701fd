//! Static fingerprint pools, partitioned into device classes on first use.

use once_cell::sync::Lazy;

use super::DeviceProfile;

/// Viewports and screens at or above this width count as desktop.
pub const DESKTOP_MIN_WIDTH: u16 = 1281;
/// Viewports and screens below this width count as mobile.
pub const MOBILE_MAX_WIDTH: u16 = 600;

const USER_AGENTS: &[&str] = &[
    // Desktop Chrome - Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    // Desktop Chrome - macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    // Desktop Chrome - Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Desktop Firefox
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    // Desktop Safari
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    // Desktop Edge
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
    // Mobile - iPhone
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/120.0.6099.119 Mobile/15E148 Safari/604.1",
    // Mobile - Android
    "Mozilla/5.0 (Linux; Android 14; SM-S918B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 12; Pixel 6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Android 14; Mobile; rv:121.0) Gecko/121.0 Firefox/121.0",
    // Tablet
    "Mozilla/5.0 (iPad; CPU OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/120.0.6099.119 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Android 13; Tablet; rv:120.0) Gecko/120.0 Firefox/120.0",
];

const SCREEN_RESOLUTIONS: &[(u16, u16)] = &[
    // Desktop/Laptop
    (1920, 1080), (2560, 1440), (1366, 768), (1536, 864), (1440, 900), (1600, 900),
    // Mobile
    (375, 812), (390, 844), (360, 740), (414, 896), (412, 915), (360, 800),
    // Tablet
    (768, 1024), (834, 1194), (810, 1080), (1280, 800),
];

const VIEWPORT_SIZES: &[(u16, u16)] = &[
    // Desktop
    (1920, 1080), (1440, 900), (1366, 768), (2560, 1440),
    // Tablet
    (768, 1024), (1024, 768), (834, 1194), (1112, 834),
    // Mobile
    (375, 812), (390, 844), (360, 740), (414, 896),
];

pub(super) const LANGUAGE_PREFERENCES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-CA,en;q=0.9,fr-CA;q=0.8,fr;q=0.7",
    "es-ES,es;q=0.9,en;q=0.8",
    "fr-FR,fr;q=0.9,en;q=0.8",
    "de-DE,de;q=0.9,en;q=0.8",
    "en;q=0.9",
    "en-US;q=0.9,en;q=0.8",
    "en-US,en;q=0.5",
];

/// Cookie alternatives grouped by cookie name. The first group is always sent.
pub(super) const COOKIE_GROUPS: &[&[&str]] = &[
    &["sessionid=abc123", "sessionid=def456", "sessionid=xyz789"],
    &[
        "_ga=GA1.2.123456789.1234567890",
        "_ga=GA1.2.987654321.0987654321",
        "_ga=GA1.2.111111111.2222222222",
    ],
    &["_gid=GA1.2.1122334455.1700000000", "_gid=GA1.2.5566778899.1700003600"],
    &["theme=light", "theme=dark"],
];

pub(super) const USER_AGENT_FALLBACK: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Device class of a user agent string.
///
/// `iPad`/`Tablet` win over the phone markers because tablet agents also
/// mention `Mobile` or `Android`.
pub fn classify_user_agent(user_agent: &str) -> DeviceProfile {
    if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        DeviceProfile::Tablet
    } else if user_agent.contains("Mobile")
        || user_agent.contains("Android")
        || user_agent.contains("iPhone")
    {
        DeviceProfile::Mobile
    } else {
        DeviceProfile::Desktop
    }
}

pub fn classify_width(width: u16) -> DeviceProfile {
    if width >= DESKTOP_MIN_WIDTH {
        DeviceProfile::Desktop
    } else if width < MOBILE_MAX_WIDTH {
        DeviceProfile::Mobile
    } else {
        DeviceProfile::Tablet
    }
}

/// Disjoint slices of the master pools belonging to one device class.
#[derive(Debug)]
pub struct ProfilePool {
    pub user_agents: Vec<&'static str>,
    pub viewports: Vec<(u16, u16)>,
    pub screen_resolutions: Vec<(u16, u16)>,
}

impl ProfilePool {
    fn build(profile: DeviceProfile) -> Self {
        Self {
            user_agents: USER_AGENTS
                .iter()
                .copied()
                .filter(|ua| classify_user_agent(ua) == profile)
                .collect(),
            viewports: VIEWPORT_SIZES
                .iter()
                .copied()
                .filter(|(w, _)| classify_width(*w) == profile)
                .collect(),
            screen_resolutions: SCREEN_RESOLUTIONS
                .iter()
                .copied()
                .filter(|(w, _)| classify_width(*w) == profile)
                .collect(),
        }
    }
}

static DESKTOP: Lazy<ProfilePool> = Lazy::new(|| ProfilePool::build(DeviceProfile::Desktop));
static MOBILE: Lazy<ProfilePool> = Lazy::new(|| ProfilePool::build(DeviceProfile::Mobile));
static TABLET: Lazy<ProfilePool> = Lazy::new(|| ProfilePool::build(DeviceProfile::Tablet));

pub fn pool_for(profile: DeviceProfile) -> &'static ProfilePool {
    match profile {
        DeviceProfile::Desktop => &DESKTOP,
        DeviceProfile::Mobile => &MOBILE,
        DeviceProfile::Tablet => &TABLET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_has_samples() {
        for profile in DeviceProfile::ALL {
            let pool = pool_for(profile);
            assert!(!pool.user_agents.is_empty(), "{profile:?} agents");
            assert!(!pool.viewports.is_empty(), "{profile:?} viewports");
            assert!(!pool.screen_resolutions.is_empty(), "{profile:?} screens");
        }
    }

    #[test]
    fn pools_are_disjoint() {
        let total: usize = DeviceProfile::ALL
            .iter()
            .map(|p| pool_for(*p).user_agents.len())
            .sum();
        assert_eq!(total, USER_AGENTS.len());
        let viewports: usize = DeviceProfile::ALL
            .iter()
            .map(|p| pool_for(*p).viewports.len())
            .sum();
        assert_eq!(viewports, VIEWPORT_SIZES.len());
    }

    #[test]
    fn tablet_markers_take_precedence() {
        assert_eq!(classify_user_agent(USER_AGENTS[20]), DeviceProfile::Tablet);
        assert_eq!(
            classify_user_agent("Mozilla/5.0 (Android 13; Tablet; rv:120.0)"),
            DeviceProfile::Tablet
        );
        assert_eq!(classify_user_agent(USER_AGENTS[16]), DeviceProfile::Mobile);
    }
}
