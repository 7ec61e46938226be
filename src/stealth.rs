//! Anti-automation-detection configuration.
//!
//! The target site fingerprints headless browsers aggressively. Three layers
//! compensate: launch flags that strip the automation markers Chromium adds
//! itself, a desktop Chrome identity (user agent, viewport, locale), and an
//! init script installed before any navigation that masks the remaining
//! `navigator` giveaways.

/// Desktop Chrome on Windows — the least remarkable identity.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Default viewport, matching a common laptop window.
pub const VIEWPORT: (u32, u32) = (1280, 720);

/// Locale reported to the site and sent as Accept-Language.
pub const LOCALE: &str = "en-US";

/// Extra Chromium launch arguments beyond headless basics.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
];

/// Installed via `Page.addScriptToEvaluateOnNewDocument` so it runs before
/// the site's own scripts on every navigation.
pub const INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5], configurable: true });
window.chrome = window.chrome || { runtime: {} };
const origQuery = window.navigator.permissions && window.navigator.permissions.query;
if (origQuery) {
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : origQuery(parameters)
    );
}
"#;

/// URL patterns blocked during extraction runs to keep navigation fast.
/// Engagement metadata never lives in media payloads.
pub const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.mp4",
    "*.webm",
    "*.m4v",
    "*.woff",
    "*.woff2",
    "*.ttf",
];
