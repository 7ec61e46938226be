//! Runtime configuration for the extraction pipeline.
//!
//! Defaults are tuned for memory-constrained hosts (small worker pool, one
//! tab per in-flight URL). Every value can be overridden with a `GRAMLENS_*`
//! environment variable.

use std::path::PathBuf;

/// Tunables for one pipeline run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Worker pool size — URLs processed concurrently.
    pub workers: usize,
    /// Page navigation timeout in milliseconds.
    pub nav_timeout_ms: u64,
    /// Settle wait after navigating a profile or reels-index page.
    pub settle_ms: u64,
    /// Interval between polls of the capture buffer.
    pub capture_poll_ms: u64,
    /// Maximum poll attempts before falling back to DOM probes.
    pub capture_poll_attempts: u32,
    /// Bound on waiting for the target card in the reels grid.
    pub card_wait_ms: u64,
    /// Location of the persisted session blob.
    pub session_file: PathBuf,
    /// Refuse to run without a session blob.
    pub require_session: bool,
    /// Block heavy media assets during extraction runs.
    pub block_media: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            nav_timeout_ms: 60_000,
            settle_ms: 3_000,
            capture_poll_ms: 200,
            capture_poll_attempts: 20,
            card_wait_ms: 8_000,
            session_file: crate::session::default_session_path(),
            require_session: false,
            block_media: true,
        }
    }
}

impl ScrapeConfig {
    /// Defaults with `GRAMLENS_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse("GRAMLENS_WORKERS") {
            cfg.workers = v;
        }
        if let Some(v) = env_parse("GRAMLENS_NAV_TIMEOUT_MS") {
            cfg.nav_timeout_ms = v;
        }
        if let Some(v) = env_parse("GRAMLENS_SETTLE_MS") {
            cfg.settle_ms = v;
        }
        if let Some(v) = env_parse("GRAMLENS_CAPTURE_POLL_MS") {
            cfg.capture_poll_ms = v;
        }
        if let Some(v) = env_parse("GRAMLENS_CAPTURE_POLL_ATTEMPTS") {
            cfg.capture_poll_attempts = v;
        }
        if let Some(v) = env_parse("GRAMLENS_CARD_WAIT_MS") {
            cfg.card_wait_ms = v;
        }
        if let Ok(v) = std::env::var("GRAMLENS_SESSION_FILE") {
            if !v.trim().is_empty() {
                cfg.session_file = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var("GRAMLENS_REQUIRE_SESSION") {
            cfg.require_session = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("GRAMLENS_BLOCK_MEDIA") {
            cfg.block_media = !matches!(v.trim(), "0" | "false" | "no");
        }
        cfg
    }

    /// Total capture poll window in milliseconds.
    pub fn capture_window_ms(&self) -> u64 {
        self.capture_poll_ms * u64::from(self.capture_poll_attempts)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
