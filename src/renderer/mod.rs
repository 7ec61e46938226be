//! Browser automation capability surface.
//!
//! Defines the `Renderer` and `PageSession` traits that abstract over the
//! browser engine (currently Chromium via chromiumoxide). The extraction
//! pipeline depends only on these traits; `mock` substitutes an in-memory
//! surface in the test suite.

pub mod chromium;
pub mod mock;

use crate::session::SessionState;
use crate::stealth;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Identity a browsing session presents to the site.
#[derive(Debug, Clone)]
pub struct Identity {
    /// User-agent string the session reports.
    pub user_agent: String,
    /// Viewport width and height.
    pub viewport: (u32, u32),
    /// BCP 47 locale, also sent as Accept-Language.
    pub locale: String,
    /// Persisted credential state to restore, if any.
    pub session: Option<SessionState>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user_agent: stealth::USER_AGENT.to_string(),
            viewport: stealth::VIEWPORT,
            locale: stealth::LOCALE.to_string(),
            session: None,
        }
    }
}

/// A network response observed during a session's lifetime.
///
/// The body is delivered as text; callers decide whether it parses as JSON.
#[derive(Debug, Clone)]
pub struct SniffedResponse {
    /// Response URL.
    pub url: String,
    /// Content-Type header value (may be empty).
    pub content_type: String,
    /// Response body text.
    pub body: String,
}

/// A browser engine that can create isolated browsing sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new isolated session (tab) presenting the given identity.
    async fn new_session(&self, identity: &Identity) -> Result<Box<dyn PageSession>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open sessions.
    fn active_sessions(&self) -> usize;
}

/// A single isolated browsing session.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to a URL, bounded by `timeout_ms`.
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()>;
    /// The URL the session actually landed on (after redirects).
    async fn current_url(&self) -> Result<String>;
    /// The rendered page title.
    async fn title(&self) -> Result<String>;
    /// Attribute of the first element matching `selector`, if any.
    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>>;
    /// Attribute values of every element matching `selector`.
    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>>;
    /// Visible text of the first element matching `selector`, if any.
    async fn query_text(&self, selector: &str) -> Result<Option<String>>;
    /// Poll for `selector` to appear, up to `timeout_ms`. False on expiry.
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool>;
    /// Stream of network responses observed on this session.
    ///
    /// Subscribe before navigating — responses arriving before the
    /// subscription are not replayed.
    async fn response_stream(&self) -> Result<BoxStream<'static, SniffedResponse>>;
    /// Close this session, releasing the underlying tab.
    async fn close(self: Box<Self>) -> Result<()>;
}
