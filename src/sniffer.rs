//! Network response sniffing.
//!
//! While a content page loads, the site's front end fetches its own metadata
//! over JSON API calls. A sniffer task consumes the session's response stream
//! and pulls the tracked fields out of any parseable body. First writer wins:
//! the first response carrying a field is the content's own metadata call,
//! later ones are peripheral (suggestions, comments, viewer state), so an
//! already-captured value is never overwritten. Which response supplies which
//! field depends on arrival order; that nondeterminism is accepted.

use crate::renderer::SniffedResponse;
use crate::search;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Keys tried for the view/play metric, in preference order.
const PLAY_COUNT_KEYS: &[&str] = &["play_count", "video_view_count"];

/// Fields the sniffer tracks, each written at most once.
#[derive(Debug, Clone, Default)]
pub struct CapturedFields {
    pub username: Option<String>,
    pub like_count: Option<String>,
    pub play_count: Option<String>,
}

impl CapturedFields {
    /// Everything the early-exit path needs: author plus a play metric.
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.play_count.is_some()
    }
}

/// Handle to a running sniffer. Dropping it without `detach` aborts the task.
pub struct SnifferHandle {
    captured: Arc<Mutex<CapturedFields>>,
    task: JoinHandle<()>,
}

impl SnifferHandle {
    /// Current capture state, for the orchestrator's poll loop.
    pub fn snapshot(&self) -> CapturedFields {
        self.captured.lock().unwrap().clone()
    }

    /// Stop further capture and return whatever was gathered.
    pub fn detach(self) -> CapturedFields {
        self.task.abort();
        self.captured.lock().unwrap().clone()
    }
}

impl Drop for SnifferHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Attach a sniffer to a session's response stream.
///
/// Subscribe the stream before navigating; responses observed before the
/// subscription are not replayed.
pub fn attach(mut stream: BoxStream<'static, SniffedResponse>) -> SnifferHandle {
    let captured = Arc::new(Mutex::new(CapturedFields::default()));
    let buffer = Arc::clone(&captured);

    let task = tokio::spawn(async move {
        while let Some(response) = stream.next().await {
            inspect(&response, &buffer);
            if buffer.lock().unwrap().is_complete() {
                break;
            }
        }
    });

    SnifferHandle { captured, task }
}

/// Inspect one response, accumulating any tracked field not yet captured.
///
/// Third-party traffic is unpredictable: anything that is not the site's
/// JSON channel, or fails to parse, is skipped without complaint.
fn inspect(response: &SniffedResponse, buffer: &Mutex<CapturedFields>) {
    if !response.url.contains("instagram.com") || !response.content_type.contains("json") {
        return;
    }
    let body: serde_json::Value = match serde_json::from_str(&response.body) {
        Ok(v) => v,
        Err(e) => {
            trace!(url = %response.url, "unparseable body skipped: {e}");
            return;
        }
    };

    let mut captured = buffer.lock().unwrap();
    if captured.username.is_none() {
        if let Some(name) = search::find_username(&body) {
            debug!(url = %response.url, username = %name, "captured author");
            captured.username = Some(name);
        }
    }
    if captured.play_count.is_none() {
        if let Some(count) = search::find_count(&body, PLAY_COUNT_KEYS) {
            debug!(url = %response.url, play_count = %count, "captured play count");
            captured.play_count = Some(count);
        }
    }
    if captured.like_count.is_none() {
        if let Some(count) = search::find_count(&body, &["like_count"]) {
            debug!(url = %response.url, like_count = %count, "captured like count");
            captured.like_count = Some(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_response(url: &str, body: serde_json::Value) -> SniffedResponse {
        SniffedResponse {
            url: url.to_string(),
            content_type: "application/json".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_inspect_captures_all_fields() {
        let buffer = Mutex::new(CapturedFields::default());
        inspect(
            &json_response(
                "https://www.instagram.com/api/v1/media/info/",
                json!({"items": [{
                    "owner": {"username": "alice"},
                    "play_count": 1200,
                    "like_count": 80
                }]}),
            ),
            &buffer,
        );
        let captured = buffer.lock().unwrap();
        assert_eq!(captured.username.as_deref(), Some("alice"));
        assert_eq!(captured.play_count.as_deref(), Some("1200"));
        assert_eq!(captured.like_count.as_deref(), Some("80"));
        assert!(captured.is_complete());
    }

    #[test]
    fn test_first_writer_wins() {
        let buffer = Mutex::new(CapturedFields::default());
        inspect(
            &json_response(
                "https://www.instagram.com/api/a",
                json!({"owner": {"username": "alice"}}),
            ),
            &buffer,
        );
        inspect(
            &json_response(
                "https://www.instagram.com/api/b",
                json!({"owner": {"username": "mallory"}, "play_count": 7}),
            ),
            &buffer,
        );
        let captured = buffer.lock().unwrap();
        // The later response fills the still-empty field only.
        assert_eq!(captured.username.as_deref(), Some("alice"));
        assert_eq!(captured.play_count.as_deref(), Some("7"));
    }

    #[test]
    fn test_inspect_skips_foreign_and_non_json_traffic() {
        let buffer = Mutex::new(CapturedFields::default());
        inspect(
            &json_response("https://cdn.example.net/x", json!({"owner": {"username": "x"}})),
            &buffer,
        );
        inspect(
            &SniffedResponse {
                url: "https://www.instagram.com/some.css".to_string(),
                content_type: "text/css".to_string(),
                body: "body{}".to_string(),
            },
            &buffer,
        );
        assert!(buffer.lock().unwrap().username.is_none());
    }

    #[test]
    fn test_inspect_swallows_parse_failures() {
        let buffer = Mutex::new(CapturedFields::default());
        inspect(
            &SniffedResponse {
                url: "https://www.instagram.com/api/v1/truncated".to_string(),
                content_type: "application/json".to_string(),
                body: "{\"owner\": {\"user".to_string(),
            },
            &buffer,
        );
        assert!(buffer.lock().unwrap().username.is_none());
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let responses = vec![
            json_response(
                "https://www.instagram.com/api/v1/media/info/",
                json!({"owner": {"username": "alice"}, "play_count": 1200}),
            ),
        ];
        let handle = attach(futures::stream::iter(responses).boxed());

        // Bounded wait for the sniffer task to drain the stream.
        let mut snapshot = handle.snapshot();
        for _ in 0..50 {
            if snapshot.is_complete() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            snapshot = handle.snapshot();
        }
        assert!(snapshot.is_complete());

        let captured = handle.detach();
        assert_eq!(captured.username.as_deref(), Some("alice"));
        assert_eq!(captured.play_count.as_deref(), Some("1200"));
    }
}
