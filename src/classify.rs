//! URL classification.
//!
//! Maps a raw URL string to the kind of content it points at. Pure string
//! matching, checked in order, first match wins — mirrors how the site's
//! own path layout distinguishes content.

use serde::{Deserialize, Serialize};

/// Bare site root, compared against the URL with trailing slashes removed.
const SITE_ROOT: &str = "https://www.instagram.com";

/// The kind of content a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentKind {
    /// A user profile page.
    Profile,
    /// A video reel.
    Reel,
    /// A photo post.
    Post,
    /// Site chrome (root, explore, inbox, stories) — nothing to extract.
    System,
    /// Not an Instagram URL at all.
    Unknown,
}

impl ContentKind {
    /// Kinds that short-circuit the pipeline without opening a session.
    pub fn is_skipped(self) -> bool {
        matches!(self, ContentKind::System | ContentKind::Unknown)
    }
}

/// Classify a URL. Total — never fails, unmatchable input is `Unknown`.
pub fn classify(url: &str) -> ContentKind {
    if url.contains("/reel/") {
        return ContentKind::Reel;
    }
    if url.contains("/p/") {
        return ContentKind::Post;
    }
    if url.trim_end_matches('/') == SITE_ROOT
        || url.contains("/explore/")
        || url.contains("/direct/")
        || url.contains("/stories/")
    {
        return ContentKind::System;
    }
    if url.contains("instagram.com/") {
        return ContentKind::Profile;
    }
    ContentKind::Unknown
}

/// Pull the opaque shortcode segment out of a reel or post URL path.
///
/// Returns the segment immediately after `/reel/` or `/p/`. Used only as a
/// substring matcher against anchor hrefs later — never validated.
pub fn shortcode(url: &str) -> Option<String> {
    let tail = url
        .split_once("/reel/")
        .or_else(|| url.split_once("/p/"))
        .map(|(_, tail)| tail)?;
    let code = tail.split('/').next().unwrap_or_default();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

/// Last non-empty path segment of a profile URL — the handle.
pub fn handle_from_profile_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
