//! Chromium-based automation surface using chromiumoxide.

use super::{Identity, PageSession, Renderer, SniffedResponse};
use crate::session::{SessionState, StoredCookie};
use crate::stealth;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams, EventResponseReceived, GetResponseBodyParams,
    SetBlockedUrLsParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. GRAMLENS_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("GRAMLENS_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.gramlens/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".gramlens/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".gramlens/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".gramlens/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".gramlens/chromium/chrome-linux64/chrome"),
                home.join(".gramlens/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// How to launch the engine.
#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    /// Headless (extraction) or headful (interactive login).
    pub headless: bool,
    /// Block heavy media assets on every session for speed.
    pub block_media: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            block_media: true,
        }
    }
}

/// Chromium-based engine. One browser process, one tab per session.
pub struct ChromiumRenderer {
    browser: Browser,
    block_media: bool,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance with the stealth launch arguments.
    pub async fn launch(opts: LaunchOptions) -> Result<Self> {
        let chrome_path =
            find_chromium().context("Chromium not found. Set GRAMLENS_CHROMIUM_PATH.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(stealth::VIEWPORT.0, stealth::VIEWPORT.1);
        builder = if opts.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        for arg in stealth::LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(headless = opts.headless, "Chromium launched");

        Ok(Self {
            browser,
            block_media: opts.block_media,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_session(&self, identity: &Identity) -> Result<Box<dyn PageSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        apply_identity(&page, identity).await?;
        if self.block_media {
            let patterns = stealth::BLOCKED_URL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect();
            page.execute(SetBlockedUrLsParams::new(patterns))
                .await
                .context("failed to block media assets")?;
        }

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser process exits when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Dress a fresh page up as the configured identity: user agent and locale,
/// fingerprint-masking init script, viewport, persisted cookies. The network
/// domain is enabled up front so both asset blocking and response events work.
async fn apply_identity(page: &Page, identity: &Identity) -> Result<()> {
    let ua = SetUserAgentOverrideParams::builder()
        .user_agent(&identity.user_agent)
        .accept_language(&identity.locale)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid user agent params: {e}"))?;
    page.execute(ua).await.context("failed to set user agent")?;

    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
        stealth::INIT_SCRIPT,
    ))
    .await
    .context("failed to install init script")?;

    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(i64::from(identity.viewport.0))
        .height(i64::from(identity.viewport.1))
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid device metrics: {e}"))?;
    page.execute(metrics)
        .await
        .context("failed to set viewport")?;

    page.execute(EnableParams::default())
        .await
        .context("failed to enable network domain")?;

    if let Some(state) = &identity.session {
        let cookies = cookie_params(state)?;
        if !cookies.is_empty() {
            page.set_cookies(cookies)
                .await
                .context("failed to restore session cookies")?;
        }
        debug!(count = state.cookies.len(), "restored session cookies");
    }

    Ok(())
}

fn cookie_params(state: &SessionState) -> Result<Vec<CookieParam>> {
    state
        .cookies
        .iter()
        .map(|c| {
            let mut builder = CookieParam::builder()
                .name(&c.name)
                .value(&c.value)
                .domain(&c.domain)
                .path(&c.path)
                .secure(c.secure)
                .http_only(c.http_only);
            if let Some(expires) = c.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            builder
                .build()
                .map_err(|e| anyhow::anyhow!("invalid stored cookie {}: {e}", c.name))
        })
        .collect()
}

/// A single Chromium tab.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url.to_string()),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .map(|u| u.to_string())
            .unwrap_or_default();
        Ok(url)
    }

    async fn title(&self) -> Result<String> {
        Ok(self
            .page
            .get_title()
            .await
            .context("failed to get title")?
            .unwrap_or_default())
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(element.attribute(attr).await.unwrap_or_default()),
            // Absent element is a normal miss, not an error.
            Err(_) => Ok(None),
        }
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(Vec::new()),
        };
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(value)) = element.attribute(attr).await {
                values.push(value);
            }
        }
        Ok(values)
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        match self.page.find_element(selector).await {
            Ok(element) => Ok(element.inner_text().await.unwrap_or_default()),
            Err(_) => Ok(None),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn response_stream(&self) -> Result<BoxStream<'static, SniffedResponse>> {
        let mut events = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to response events")?;

        let page = self.page.clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<SniffedResponse>(64);

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = event.response.url.clone();
                let content_type = event.response.mime_type.clone();
                // Prefilter before the body fetch: peripheral assets vastly
                // outnumber the structured-data channel.
                if !url.contains("instagram.com") || !content_type.contains("json") {
                    continue;
                }
                let body = match page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(resp) => {
                        if resp.base64_encoded {
                            BASE64
                                .decode(resp.body.as_bytes())
                                .ok()
                                .and_then(|bytes| String::from_utf8(bytes).ok())
                        } else {
                            Some(resp.body.clone())
                        }
                    }
                    Err(e) => {
                        // Bodies for short-lived responses may already be gone.
                        debug!(%url, "response body unavailable: {e}");
                        None
                    }
                };
                let Some(body) = body else { continue };
                if tx
                    .send(SniffedResponse {
                        url,
                        content_type,
                        body,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

/// Interactive login flow.
///
/// Launches headful, lets the operator log in by hand, detects the
/// post-login sidebar element, then persists the context's cookies so
/// headless runs can replay the session.
pub async fn interactive_login(session_path: &Path, wait_ms: u64) -> Result<()> {
    let renderer = ChromiumRenderer::launch(LaunchOptions {
        headless: false,
        block_media: false,
    })
    .await?;

    let page = renderer
        .browser
        .new_page("https://www.instagram.com/")
        .await
        .context("failed to open login page")?;

    eprintln!("Log in manually in the browser window.");
    eprintln!("Waiting up to {}s for the home feed...", wait_ms / 1000);

    let deadline = Instant::now() + Duration::from_millis(wait_ms);
    loop {
        if page.find_element("svg[aria-label='Home']").await.is_ok() {
            break;
        }
        if Instant::now() >= deadline {
            let _ = page.close().await;
            bail!("timed out waiting for login");
        }
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }

    info!("login detected");
    // Let the post-login cookie writes settle.
    tokio::time::sleep(Duration::from_secs(5)).await;

    let cookies = page
        .get_cookies()
        .await
        .context("failed to read cookies")?
        .into_iter()
        .map(|c| StoredCookie {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            secure: c.secure,
            http_only: c.http_only,
            // Session cookies report a negative expiry.
            expires: (c.expires >= 0.0).then_some(c.expires),
        })
        .collect::<Vec<_>>();

    if cookies.is_empty() {
        warn!("no cookies captured; the session blob will not authenticate");
    }

    SessionState::new(cookies).save(session_path)?;
    eprintln!("Session saved to {}", session_path.display());

    let _ = page.close().await;
    Ok(())
}
