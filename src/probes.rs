//! DOM fallback probes.
//!
//! When network sniffing comes up short, these probes query the rendered
//! page instead. Each probe is independent and best-effort: a missing
//! element, absent attribute, or parse miss degrades to `None` (logged at
//! debug) so the remaining probes still run. The orchestrator decides which
//! probes apply and never overwrites a field that already has a value.

use crate::config::ScrapeConfig;
use crate::renderer::PageSession;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Field could not be determined at all.
pub const SENTINEL_NA: &str = "N/A";
/// Photo content has no view metric.
pub const SENTINEL_PHOTO: &str = "N/A (Photo)";
/// The author's reels index redirected to the main grid; views are hidden.
pub const SENTINEL_HIDDEN: &str = "Hidden (Main Grid)";
/// The target card never appeared in the reels grid.
pub const SENTINEL_NOT_FOUND: &str = "Not Found";

const FOLLOWERS_ANCHOR: &str = "a[href*='/followers/']";
const FOLLOWERS_TITLE: &str = "a[href*='/followers/'] span[title]";
const REELS_ANCHOR: &str = "a[href*='/reels/']";
const OG_DESCRIPTION: &str = "meta[property=\"og:description\"]";
const OG_TYPE: &str = "meta[property=\"og:type\"]";

/// Follower count from the followers anchor.
///
/// The titled child span carries the exact count; the anchor's visible text
/// is often abbreviated ("1.2M"). Prefer exact, fall back to abbreviated.
pub async fn followers(session: &dyn PageSession) -> Option<String> {
    match session.query_attr(FOLLOWERS_TITLE, "title").await {
        Ok(Some(exact)) if !exact.trim().is_empty() => return Some(exact.trim().to_string()),
        Ok(_) => {}
        Err(e) => debug!("follower title probe failed: {e:#}"),
    }
    match session.query_text(FOLLOWERS_ANCHOR).await {
        Ok(Some(text)) => text
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string),
        Ok(None) => None,
        Err(e) => {
            debug!("follower anchor probe failed: {e:#}");
            None
        }
    }
}

/// Author handle parsed from the page title.
///
/// Two patterns in priority order: an `(@handle)` suffix, then a leading
/// single-token name before " on Instagram". Multi-word leading names are
/// captions, not handles, and are rejected.
pub fn author_from_title(title: &str) -> Option<String> {
    let at_re = Regex::new(r"\(@([^)]+)\)").expect("handle regex is valid");
    if let Some(captures) = at_re.captures(title) {
        return Some(captures[1].to_string());
    }

    let on_re = Regex::new(r"^(.*?)\son\sInstagram").expect("title regex is valid");
    let leading = on_re.captures(title)?.get(1)?.as_str().trim().to_string();
    let mut tokens = leading.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(token), None) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

/// Author handle scanned from anchors into a reels index.
///
/// A reels-index href ends in `.../{handle}/reels`; the segment before the
/// trailing `reels` is the candidate. The literal tokens `reels` and
/// `instagram` are navigation chrome, not users.
pub async fn author_from_links(session: &dyn PageSession) -> Option<String> {
    let hrefs = match session.query_all_attr(REELS_ANCHOR, "href").await {
        Ok(hrefs) => hrefs,
        Err(e) => {
            debug!("reels link probe failed: {e:#}");
            return None;
        }
    };
    for href in hrefs {
        let parts: Vec<&str> = href.trim_matches('/').split('/').collect();
        if parts.len() >= 2 && parts[parts.len() - 1] == "reels" {
            let candidate = parts[parts.len() - 2];
            if !candidate.is_empty() && candidate != "reels" && candidate != "instagram" {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Like count parsed from the description meta tag.
pub async fn likes_from_meta(session: &dyn PageSession) -> Option<String> {
    let content = match session.query_attr(OG_DESCRIPTION, "content").await {
        Ok(Some(content)) => content,
        Ok(None) => return None,
        Err(e) => {
            debug!("description meta probe failed: {e:#}");
            return None;
        }
    };
    parse_likes(&content)
}

/// Leading "<number><optional K/M suffix> likes" pattern.
pub fn parse_likes(description: &str) -> Option<String> {
    let re = Regex::new(r"^([0-9,.]+[KkMm]?) likes").expect("likes regex is valid");
    re.captures(description).map(|c| c[1].to_string())
}

/// Whether the content is video. Reels always are; posts only when the
/// og:type meta says so.
pub async fn detect_video(session: &dyn PageSession, is_reel: bool) -> bool {
    if is_reel {
        return true;
    }
    match session.query_attr(OG_TYPE, "content").await {
        Ok(Some(og_type)) => og_type.contains("video"),
        Ok(None) => false,
        Err(e) => {
            debug!("og:type probe failed: {e:#}");
            false
        }
    }
}

/// View count from the author's reels index.
///
/// Navigates to the index, confirms the navigation actually landed there
/// (the site silently redirects to the main grid when reels are hidden),
/// then reads the engagement line off the card whose link carries the
/// target shortcode. Bounded waits throughout; expiry records a sentinel
/// rather than retrying.
pub async fn views_from_reels_grid(
    session: &dyn PageSession,
    author: &str,
    shortcode: &str,
    cfg: &ScrapeConfig,
) -> Option<String> {
    let grid_url = format!("https://www.instagram.com/{author}/reels/");
    if let Err(e) = session.navigate(&grid_url, cfg.nav_timeout_ms).await {
        debug!("reels grid navigation failed: {e:#}");
        return None;
    }
    tokio::time::sleep(Duration::from_millis(cfg.settle_ms)).await;

    match session.current_url().await {
        Ok(landed) if !landed.contains("/reels/") => {
            return Some(SENTINEL_HIDDEN.to_string());
        }
        Ok(_) => {}
        Err(e) => {
            debug!("reels grid url check failed: {e:#}");
            return None;
        }
    }

    let card_selector = format!("a[href*='{shortcode}']");
    match session.wait_for_selector(&card_selector, cfg.card_wait_ms).await {
        Ok(true) => {}
        Ok(false) => return Some(SENTINEL_NOT_FOUND.to_string()),
        Err(e) => {
            debug!("card wait failed: {e:#}");
            return Some(SENTINEL_NOT_FOUND.to_string());
        }
    }

    match session.query_text(&card_selector).await {
        Ok(Some(text)) => Some(
            text.lines()
                .find(|line| line.chars().any(|c| c.is_ascii_digit()))
                .map(|line| line.trim().to_string())
                .unwrap_or_else(|| SENTINEL_NOT_FOUND.to_string()),
        ),
        Ok(None) => Some(SENTINEL_NOT_FOUND.to_string()),
        Err(e) => {
            debug!("card text probe failed: {e:#}");
            Some(SENTINEL_NOT_FOUND.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mock::{MockRenderer, PageScript};
    use crate::renderer::Renderer;

    #[test]
    fn test_author_from_title_at_handle() {
        assert_eq!(
            author_from_title("Some Caption (@bob) • Instagram"),
            Some("bob".to_string())
        );
    }

    #[test]
    fn test_author_from_title_single_token_name() {
        assert_eq!(
            author_from_title("natgeo on Instagram: \"Wow\""),
            Some("natgeo".to_string())
        );
    }

    #[test]
    fn test_author_from_title_multi_word_rejected() {
        assert_eq!(author_from_title("A long caption on Instagram"), None);
    }

    #[test]
    fn test_author_from_title_prefers_at_handle() {
        assert_eq!(
            author_from_title("natgeo on Instagram (@realnatgeo)"),
            Some("realnatgeo".to_string())
        );
    }

    #[test]
    fn test_author_from_title_no_match() {
        assert_eq!(author_from_title("Page Not Found"), None);
    }

    #[test]
    fn test_parse_likes() {
        assert_eq!(
            parse_likes("1,204 likes, 33 comments - bob"),
            Some("1,204".to_string())
        );
        assert_eq!(parse_likes("1.2M likes, lots of comments"), Some("1.2M".to_string()));
        assert_eq!(parse_likes("33 comments only"), None);
        // Pattern is anchored at the start.
        assert_eq!(parse_likes("bob - 500 likes"), None);
    }

    async fn session_for(script: PageScript) -> Box<dyn crate::renderer::PageSession> {
        MockRenderer::new(vec![script])
            .new_session(&Default::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_followers_prefers_exact_title() {
        let session = session_for(
            PageScript::default()
                .with_attr(FOLLOWERS_TITLE, "title", "1,234,567")
                .with_text(FOLLOWERS_ANCHOR, "1.2M\nfollowers"),
        )
        .await;
        assert_eq!(followers(session.as_ref()).await, Some("1,234,567".to_string()));
    }

    #[tokio::test]
    async fn test_followers_falls_back_to_anchor_text() {
        let session =
            session_for(PageScript::default().with_text(FOLLOWERS_ANCHOR, "1.2M\nfollowers")).await;
        assert_eq!(followers(session.as_ref()).await, Some("1.2M".to_string()));
    }

    #[tokio::test]
    async fn test_followers_absent() {
        let session = session_for(PageScript::default()).await;
        assert_eq!(followers(session.as_ref()).await, None);
    }

    #[tokio::test]
    async fn test_author_from_links_skips_chrome_segments() {
        let session = session_for(PageScript::default().with_all_attrs(
            REELS_ANCHOR,
            "href",
            &["/reels/", "/instagram/reels/", "/alice/reels/"],
        ))
        .await;
        assert_eq!(
            author_from_links(session.as_ref()).await,
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn test_author_from_links_no_candidates() {
        let session =
            session_for(PageScript::default().with_all_attrs(REELS_ANCHOR, "href", &["/reels/"]))
                .await;
        assert_eq!(author_from_links(session.as_ref()).await, None);
    }

    #[tokio::test]
    async fn test_likes_from_meta() {
        let session = session_for(PageScript::default().with_attr(
            OG_DESCRIPTION,
            "content",
            "2,411 likes, 54 comments - alice on January 1",
        ))
        .await;
        assert_eq!(
            likes_from_meta(session.as_ref()).await,
            Some("2,411".to_string())
        );
    }

    #[tokio::test]
    async fn test_detect_video() {
        let reel_session = session_for(PageScript::default()).await;
        assert!(detect_video(reel_session.as_ref(), true).await);

        let video_post =
            session_for(PageScript::default().with_attr(OG_TYPE, "content", "video.other")).await;
        assert!(detect_video(video_post.as_ref(), false).await);

        let photo_post = session_for(PageScript::default()).await;
        assert!(!detect_video(photo_post.as_ref(), false).await);
    }

    fn quick_cfg() -> ScrapeConfig {
        ScrapeConfig {
            settle_ms: 0,
            card_wait_ms: 10,
            nav_timeout_ms: 100,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_views_from_reels_grid_reads_card() {
        let session = session_for(
            PageScript::default().with_text("a[href*='Cxyz']", "Pinned\n153K\nviews"),
        )
        .await;
        assert_eq!(
            views_from_reels_grid(session.as_ref(), "alice", "Cxyz", &quick_cfg()).await,
            Some("153K".to_string())
        );
    }

    #[tokio::test]
    async fn test_views_from_reels_grid_redirect_is_hidden() {
        let session = session_for(PageScript::default().with_redirect(
            "https://www.instagram.com/alice/reels/",
            "https://www.instagram.com/alice/",
        ))
        .await;
        assert_eq!(
            views_from_reels_grid(session.as_ref(), "alice", "Cxyz", &quick_cfg()).await,
            Some(SENTINEL_HIDDEN.to_string())
        );
    }

    #[tokio::test]
    async fn test_views_from_reels_grid_missing_card_is_not_found() {
        let session = session_for(PageScript::default()).await;
        assert_eq!(
            views_from_reels_grid(session.as_ref(), "alice", "Cxyz", &quick_cfg()).await,
            Some(SENTINEL_NOT_FOUND.to_string())
        );
    }
}
