//! Per-URL extraction pipeline.
//!
//! One invocation processes one URL to completion inside its own isolated
//! browsing session: classify, navigate with the sniffer attached, poll the
//! capture buffer within a bounded window, then either exit early on a full
//! network capture or fall back to the DOM probes. Every exit path yields a
//! fully formed [`ExtractionResult`] and closes the session exactly once;
//! nothing thrown here can take a sibling URL down with it.

use crate::classify::{self, ContentKind};
use crate::config::ScrapeConfig;
use crate::probes;
use crate::renderer::{Identity, PageSession, Renderer};
use crate::sniffer;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal (or initial) processing state of one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrapeStatus {
    Starting,
    Skipped,
    Success,
    #[serde(rename = "Failed (No Author)")]
    FailedNoAuthor,
    Error,
}

/// Everything extracted for one input URL.
///
/// Metric fields are display strings as the site rendered them — they may
/// carry K/M suffixes or sentinel text, and are never parsed to numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub url: String,
    pub kind: ContentKind,
    pub author: Option<String>,
    pub followers: String,
    pub likes: String,
    pub views: String,
    pub status: ScrapeStatus,
}

impl ExtractionResult {
    fn new(url: &str, kind: ContentKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
            author: None,
            followers: probes::SENTINEL_NA.to_string(),
            likes: probes::SENTINEL_NA.to_string(),
            views: probes::SENTINEL_NA.to_string(),
            status: ScrapeStatus::Starting,
        }
    }
}

/// Process one URL to a terminal result. Never fails — failures become
/// status `Error` on the returned record.
pub async fn scrape_url(
    renderer: &dyn Renderer,
    url: &str,
    identity: &Identity,
    cfg: &ScrapeConfig,
) -> ExtractionResult {
    let kind = classify::classify(url);
    let mut result = ExtractionResult::new(url, kind);

    if kind.is_skipped() {
        debug!(%url, ?kind, "skipping without navigation");
        result.status = ScrapeStatus::Skipped;
        return result;
    }

    info!(%url, ?kind, "processing");

    let session = match renderer.new_session(identity).await {
        Ok(session) => session,
        Err(e) => {
            warn!(%url, "failed to open session: {e:#}");
            result.status = ScrapeStatus::Error;
            return result;
        }
    };

    if let Err(e) = extract(session.as_ref(), &mut result, cfg).await {
        warn!(%url, "extraction error: {e:#}");
        result.status = ScrapeStatus::Error;
    }

    // Release the session on every path; a close failure does not change
    // the already-determined status.
    if let Err(e) = session.close().await {
        warn!(%url, "session close failed: {e:#}");
    }

    result
}

async fn extract(
    session: &dyn PageSession,
    result: &mut ExtractionResult,
    cfg: &ScrapeConfig,
) -> anyhow::Result<()> {
    match result.kind {
        ContentKind::Profile => extract_profile(session, result, cfg).await,
        ContentKind::Reel | ContentKind::Post => extract_content(session, result, cfg).await,
        // Unreachable: skipped kinds return before a session is opened.
        ContentKind::System | ContentKind::Unknown => Ok(()),
    }
}

/// Profile pages are DOM-only: no metadata API call worth sniffing fires on
/// load, and the author is already in the URL.
async fn extract_profile(
    session: &dyn PageSession,
    result: &mut ExtractionResult,
    cfg: &ScrapeConfig,
) -> anyhow::Result<()> {
    session.navigate(&result.url, cfg.nav_timeout_ms).await?;
    tokio::time::sleep(Duration::from_millis(cfg.settle_ms)).await;

    if let Some(count) = probes::followers(session).await {
        result.followers = count;
    }
    result.author = classify::handle_from_profile_url(&result.url);
    result.status = ScrapeStatus::Success;
    Ok(())
}

async fn extract_content(
    session: &dyn PageSession,
    result: &mut ExtractionResult,
    cfg: &ScrapeConfig,
) -> anyhow::Result<()> {
    let shortcode = classify::shortcode(&result.url);

    // Subscribe before navigating so the first metadata response is seen.
    let handle = sniffer::attach(session.response_stream().await?);
    session.navigate(&result.url, cfg.nav_timeout_ms).await?;

    // Bounded busy-wait for the network capture.
    for _ in 0..cfg.capture_poll_attempts {
        if handle.snapshot().is_complete() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(cfg.capture_poll_ms)).await;
    }
    let captured = handle.detach();

    if let Some(username) = captured.username {
        result.author = Some(username);
    }
    if let Some(play_count) = captured.play_count {
        result.views = play_count;
    }
    if let Some(like_count) = captured.like_count {
        result.likes = like_count;
    }

    // Early exit: author plus an engagement metric straight off the wire
    // means the DOM probes have nothing left to add.
    if result.author.is_some() && result.views != probes::SENTINEL_NA {
        debug!(url = %result.url, "network capture complete, skipping DOM fallback");
        result.status = ScrapeStatus::Success;
        return Ok(());
    }

    fallback(session, result, shortcode.as_deref(), cfg).await;
    Ok(())
}

/// DOM fallback, filling only still-empty fields.
///
/// The reels-grid probe navigates away from the content page, so every
/// probe that reads the current page runs before it.
async fn fallback(
    session: &dyn PageSession,
    result: &mut ExtractionResult,
    shortcode: Option<&str>,
    cfg: &ScrapeConfig,
) {
    if result.followers == probes::SENTINEL_NA {
        if let Some(count) = probes::followers(session).await {
            result.followers = count;
        }
    }

    if result.author.is_none() {
        match session.title().await {
            Ok(title) => result.author = probes::author_from_title(&title),
            Err(e) => debug!("title probe failed: {e:#}"),
        }
    }
    if result.author.is_none() {
        result.author = probes::author_from_links(session).await;
    }

    if result.likes == probes::SENTINEL_NA {
        if let Some(likes) = probes::likes_from_meta(session).await {
            result.likes = likes;
        }
    }

    let Some(author) = result.author.clone() else {
        result.status = ScrapeStatus::FailedNoAuthor;
        return;
    };

    let is_video = probes::detect_video(session, result.kind == ContentKind::Reel).await;
    if !is_video {
        if result.views == probes::SENTINEL_NA {
            result.views = probes::SENTINEL_PHOTO.to_string();
        }
    } else if result.views == probes::SENTINEL_NA {
        if let Some(code) = shortcode {
            if let Some(views) = probes::views_from_reels_grid(session, &author, code, cfg).await {
                result.views = views;
            }
        }
    }

    result.status = ScrapeStatus::Success;
}
