//! In-memory automation surface used by the test suite.
//!
//! Each `PageScript` scripts one session: its title, element attributes and
//! text, simulated redirects, and the network responses the session would
//! observe. `MockRenderer` hands scripts out in order and counts opens and
//! closes so tests can assert that no session leaks.

use super::{Identity, PageSession, Renderer, SniffedResponse};
use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted behavior for one mock session.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    /// Page title after navigation.
    pub title: String,
    /// `(selector, attr)` → first-match attribute value.
    pub attrs: HashMap<(String, String), String>,
    /// `(selector, attr)` → all-match attribute values.
    pub all_attrs: HashMap<(String, String), Vec<String>>,
    /// `selector` → first-match visible text.
    pub texts: HashMap<String, String>,
    /// Selectors that `wait_for_selector` finds immediately.
    pub present: HashSet<String>,
    /// Responses the session observes after navigation.
    pub responses: Vec<SniffedResponse>,
    /// Navigation target → URL the session lands on instead.
    pub redirects: HashMap<String, String>,
    /// Fail every navigation attempt.
    pub fail_navigation: bool,
}

impl PageScript {
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_attr(mut self, selector: &str, attr: &str, value: &str) -> Self {
        self.attrs
            .insert((selector.to_string(), attr.to_string()), value.to_string());
        self
    }

    pub fn with_all_attrs(mut self, selector: &str, attr: &str, values: &[&str]) -> Self {
        self.all_attrs.insert(
            (selector.to_string(), attr.to_string()),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.present.insert(selector.to_string());
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_json_response(mut self, url: &str, body: serde_json::Value) -> Self {
        self.responses.push(SniffedResponse {
            url: url.to_string(),
            content_type: "application/json; charset=utf-8".to_string(),
            body: body.to_string(),
        });
        self
    }

    pub fn with_raw_response(mut self, url: &str, content_type: &str, body: &str) -> Self {
        self.responses.push(SniffedResponse {
            url: url.to_string(),
            content_type: content_type.to_string(),
            body: body.to_string(),
        });
        self
    }

    pub fn with_redirect(mut self, target: &str, landed: &str) -> Self {
        self.redirects
            .insert(target.to_string(), landed.to_string());
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }
}

/// Mock engine: hands out scripted sessions in order.
pub struct MockRenderer {
    scripts: Mutex<VecDeque<PageScript>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    nav_log: Arc<Mutex<Vec<String>>>,
}

impl MockRenderer {
    pub fn new(scripts: Vec<PageScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            nav_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sessions handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every navigation any session was asked to perform, in order.
    pub fn navigation_log(&self) -> Vec<String> {
        self.nav_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn new_session(&self, _identity: &Identity) -> Result<Box<dyn PageSession>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            script,
            current_url: Mutex::new(String::new()),
            nav_log: Arc::clone(&self.nav_log),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// One scripted session.
pub struct MockSession {
    script: PageScript,
    current_url: Mutex<String>,
    nav_log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for MockSession {
    async fn navigate(&self, url: &str, _timeout_ms: u64) -> Result<()> {
        self.nav_log.lock().unwrap().push(url.to_string());
        if self.script.fail_navigation {
            bail!("scripted navigation failure for {url}");
        }
        let landed = self
            .script
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        *self.current_url.lock().unwrap() = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.script.title.clone())
    }

    async fn query_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        Ok(self
            .script
            .attrs
            .get(&(selector.to_string(), attr.to_string()))
            .cloned())
    }

    async fn query_all_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>> {
        Ok(self
            .script
            .all_attrs
            .get(&(selector.to_string(), attr.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn query_text(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.script.texts.get(selector).cloned())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout_ms: u64) -> Result<bool> {
        Ok(self.script.present.contains(selector))
    }

    async fn response_stream(&self) -> Result<BoxStream<'static, SniffedResponse>> {
        Ok(futures::stream::iter(self.script.responses.clone()).boxed())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
