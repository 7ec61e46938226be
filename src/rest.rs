//! HTTP front end.
//!
//! A thin axum layer over the batch runner: accept raw URL strings in
//! whatever shape the caller has them (a list, or one delimited blob),
//! normalize, run the pipeline, return the records. The browser engine is
//! initialized once at startup and injected here — never reached for as a
//! global.

use crate::batch;
use crate::config::ScrapeConfig;
use crate::renderer::Renderer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared state for every request handler.
pub struct AppState {
    pub renderer: Arc<dyn Renderer>,
    pub config: ScrapeConfig,
}

/// Build the axum Router with all endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/scrape", post(handle_scrape))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the given port.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.renderer.active_sessions(),
        "session_blob": state.config.session_file.exists(),
    }))
}

/// `POST /api/v1/scrape` with body `{"urls": [...]}` or `{"urls": "a,b\nc"}`.
async fn handle_scrape(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let urls = normalize_urls(body.get("urls").unwrap_or(&Value::Null));
    if urls.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No valid URLs provided" })),
        ));
    }

    info!(count = urls.len(), "scrape request");
    let results =
        batch::run_batch(Arc::clone(&state.renderer), &urls, &state.config).await;
    Ok(Json(json!(results)))
}

/// Flatten whatever shape the caller sent into trimmed, non-empty URLs.
///
/// A list is joined and re-split so embedded commas and newlines inside
/// list entries still separate URLs, matching the lenient front ends this
/// replaces.
pub fn normalize_urls(raw: &Value) -> Vec<String> {
    let joined = match raw {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::String(s) => s.clone(),
        _ => return Vec::new(),
    };

    joined
        .replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
