//! Batch fan-out over the extraction pipeline.
//!
//! URLs are independent, so they run through a bounded worker pool: at most
//! `workers` in flight, each owning one fresh session from the shared
//! engine handle. Nothing — cookies, capture buffers, listeners — is shared
//! between URLs. One result per non-empty input; completion order is
//! whatever the pool produces.

use crate::config::ScrapeConfig;
use crate::orchestrator::{self, ExtractionResult};
use crate::renderer::{Identity, Renderer};
use crate::session::SessionState;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the pipeline over a list of URLs with bounded concurrency.
pub async fn run_batch(
    renderer: Arc<dyn Renderer>,
    urls: &[String],
    cfg: &ScrapeConfig,
) -> Vec<ExtractionResult> {
    let identity = batch_identity(cfg);
    let work: Vec<String> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(ToString::to_string)
        .collect();

    info!(urls = work.len(), workers = cfg.workers, "starting batch");

    let results: Vec<ExtractionResult> = futures::stream::iter(work)
        .map(|url| {
            let renderer = Arc::clone(&renderer);
            let identity = identity.clone();
            let cfg = cfg.clone();
            async move { orchestrator::scrape_url(renderer.as_ref(), &url, &identity, &cfg).await }
        })
        .buffer_unordered(cfg.workers.max(1))
        .collect()
        .await;

    info!(results = results.len(), "batch complete");
    results
}

/// Identity shared by every session in the batch: the stealth defaults plus
/// the persisted credential state, when a blob is present and readable.
fn batch_identity(cfg: &ScrapeConfig) -> Identity {
    let session = match SessionState::load_if_present(&cfg.session_file) {
        Ok(state) => state,
        Err(e) => {
            warn!(path = %cfg.session_file.display(), "ignoring unreadable session blob: {e}");
            None
        }
    };
    Identity {
        session,
        ..Identity::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ContentKind;
    use crate::orchestrator::ScrapeStatus;
    use crate::renderer::mock::{MockRenderer, PageScript};

    fn quick_cfg() -> ScrapeConfig {
        ScrapeConfig {
            workers: 1,
            settle_ms: 0,
            capture_poll_ms: 2,
            capture_poll_attempts: 5,
            card_wait_ms: 10,
            nav_timeout_ms: 100,
            session_file: std::path::PathBuf::from("/nonexistent/session.json"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_one_result_per_nonempty_input() {
        // workers=1 makes script handout order deterministic.
        let renderer = Arc::new(MockRenderer::new(vec![
            PageScript::default(),
            PageScript::default().failing_navigation(),
        ]));
        let urls = vec![
            "https://www.instagram.com/alice/".to_string(),
            "   ".to_string(),
            "https://www.instagram.com/reel/Cx/".to_string(),
            "https://www.instagram.com".to_string(),
        ];
        let results = run_batch(Arc::clone(&renderer) as Arc<dyn Renderer>, &urls, &quick_cfg()).await;

        assert_eq!(results.len(), 3);
        let by_kind = |k: ContentKind| results.iter().find(|r| r.kind == k).unwrap();
        assert_eq!(by_kind(ContentKind::Profile).status, ScrapeStatus::Success);
        assert_eq!(by_kind(ContentKind::Reel).status, ScrapeStatus::Error);
        assert_eq!(by_kind(ContentKind::System).status, ScrapeStatus::Skipped);
    }

    #[tokio::test]
    async fn test_no_session_leak_across_mixed_outcomes() {
        let renderer = Arc::new(MockRenderer::new(vec![
            PageScript::default(),
            PageScript::default().failing_navigation(),
            PageScript::default().with_title("x (@zed)"),
        ]));
        let urls = vec![
            "https://www.instagram.com/alice/".to_string(),
            "https://www.instagram.com/reel/Ca/".to_string(),
            "https://www.instagram.com/p/Cb/".to_string(),
        ];
        let _ = run_batch(Arc::clone(&renderer) as Arc<dyn Renderer>, &urls, &quick_cfg()).await;

        assert_eq!(renderer.opened(), 3);
        assert_eq!(renderer.closed(), 3);
        assert_eq!(renderer.active_sessions(), 0);
    }
}
