//! End-to-end pipeline tests over the mock automation surface.

use gramlens::batch::run_batch;
use gramlens::classify::ContentKind;
use gramlens::config::ScrapeConfig;
use gramlens::orchestrator::{ExtractionResult, ScrapeStatus};
use gramlens::renderer::mock::{MockRenderer, PageScript};
use gramlens::renderer::Renderer;
use serde_json::json;
use std::sync::Arc;

fn quick_cfg() -> ScrapeConfig {
    ScrapeConfig {
        workers: 1,
        settle_ms: 0,
        capture_poll_ms: 2,
        capture_poll_attempts: 50,
        card_wait_ms: 10,
        nav_timeout_ms: 100,
        session_file: std::path::PathBuf::from("/nonexistent/session.json"),
        ..Default::default()
    }
}

fn find<'a>(results: &'a [ExtractionResult], url: &str) -> &'a ExtractionResult {
    results
        .iter()
        .find(|r| r.url == url)
        .unwrap_or_else(|| panic!("no result for {url}"))
}

#[tokio::test]
async fn mixed_batch_produces_one_terminal_record_per_url() {
    // workers=1: scripts are handed out in input order, skipped URLs
    // consume none.
    let renderer = Arc::new(MockRenderer::new(vec![
        // Profile with an exact follower count.
        PageScript::default().with_attr("a[href*='/followers/'] span[title]", "title", "12,345"),
        // Reel fully served by network capture.
        PageScript::default().with_json_response(
            "https://www.instagram.com/api/v1/media/Cxy/info/",
            json!({"items": [{"owner": {"username": "alice"}, "play_count": 99000, "like_count": 1200}]}),
        ),
        // Post resolved from the title, no video marker.
        PageScript::default().with_title("Sunset shot (@bob)"),
        // Reel where everything fails.
        PageScript::default().failing_navigation(),
    ]));

    let urls: Vec<String> = [
        "https://www.instagram.com/natgeo/",
        "https://www.instagram.com",
        "https://www.instagram.com/reel/Cxy/",
        "https://www.instagram.com/p/Bzz/",
        "https://www.instagram.com/reel/Broken/",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let results = run_batch(Arc::clone(&renderer) as Arc<dyn Renderer>, &urls, &quick_cfg()).await;
    assert_eq!(results.len(), 5);

    let profile = find(&results, "https://www.instagram.com/natgeo/");
    assert_eq!(profile.status, ScrapeStatus::Success);
    assert_eq!(profile.author.as_deref(), Some("natgeo"));
    assert_eq!(profile.followers, "12,345");

    let root = find(&results, "https://www.instagram.com");
    assert_eq!(root.kind, ContentKind::System);
    assert_eq!(root.status, ScrapeStatus::Skipped);
    assert_eq!(root.views, "N/A");

    let reel = find(&results, "https://www.instagram.com/reel/Cxy/");
    assert_eq!(reel.status, ScrapeStatus::Success);
    assert_eq!(reel.author.as_deref(), Some("alice"));
    assert_eq!(reel.views, "99000");
    assert_eq!(reel.likes, "1200");

    let post = find(&results, "https://www.instagram.com/p/Bzz/");
    assert_eq!(post.status, ScrapeStatus::Success);
    assert_eq!(post.author.as_deref(), Some("bob"));
    assert_eq!(post.views, "N/A (Photo)");

    let broken = find(&results, "https://www.instagram.com/reel/Broken/");
    assert_eq!(broken.status, ScrapeStatus::Error);

    // Four sessions opened (the skip never opens one), all released.
    assert_eq!(renderer.opened(), 4);
    assert_eq!(renderer.closed(), 4);
    assert_eq!(renderer.active_sessions(), 0);
}

#[tokio::test]
async fn reel_views_are_sentinel_or_contain_a_digit() {
    let scripts = vec![
        // Network capture path.
        PageScript::default().with_json_response(
            "https://www.instagram.com/api/x",
            json!({"owner": {"username": "a"}, "play_count": 10}),
        ),
        // Grid fallback path.
        PageScript::default()
            .with_title("v (@b)")
            .with_text("a[href*='C2']", "Pinned\n1.5M"),
        // Hidden grid path.
        PageScript::default()
            .with_title("v (@c)")
            .with_redirect(
                "https://www.instagram.com/c/reels/",
                "https://www.instagram.com/c/",
            ),
        // Card never appears.
        PageScript::default().with_title("v (@d)"),
    ];
    let renderer = Arc::new(MockRenderer::new(scripts));
    let urls: Vec<String> = ["C1", "C2", "C3", "C4"]
        .iter()
        .map(|c| format!("https://www.instagram.com/reel/{c}/"))
        .collect();

    let results = run_batch(renderer as Arc<dyn Renderer>, &urls, &quick_cfg()).await;

    let sentinels = ["N/A", "N/A (Photo)", "Hidden (Main Grid)", "Not Found"];
    for result in &results {
        assert!(!result.views.is_empty(), "views empty for {}", result.url);
        assert!(
            sentinels.contains(&result.views.as_str())
                || result.views.chars().any(|c| c.is_ascii_digit()),
            "unexpected views {:?} for {}",
            result.views,
            result.url
        );
    }
    assert_eq!(find(&results, &urls[1]).views, "1.5M");
    assert_eq!(find(&results, &urls[2]).views, "Hidden (Main Grid)");
    assert_eq!(find(&results, &urls[3]).views, "Not Found");
}

#[tokio::test]
async fn no_author_reel_fails_without_error() {
    let renderer = Arc::new(MockRenderer::new(vec![PageScript::default()
        .with_title("Watch this")]));
    let urls = vec!["https://www.instagram.com/reel/Cq/".to_string()];

    let results = run_batch(renderer as Arc<dyn Renderer>, &urls, &quick_cfg()).await;
    let result = &results[0];

    assert_eq!(result.status, ScrapeStatus::FailedNoAuthor);
    assert_eq!(result.author, None);

    // Status serializes as the human-readable display string.
    let value = serde_json::to_value(result).unwrap();
    assert_eq!(value["status"], json!("Failed (No Author)"));
    assert_eq!(value["kind"], json!("REEL"));
    assert_eq!(value["author"], json!(null));
}

#[tokio::test]
async fn result_records_serialize_with_all_fields() {
    let renderer = Arc::new(MockRenderer::new(vec![]));
    let urls = vec!["https://www.instagram.com/explore/".to_string()];

    let results = run_batch(renderer as Arc<dyn Renderer>, &urls, &quick_cfg()).await;
    let value = serde_json::to_value(&results[0]).unwrap();

    for field in ["url", "kind", "author", "followers", "likes", "views", "status"] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(value["status"], json!("Skipped"));
    assert_eq!(value["followers"], json!("N/A"));
}
