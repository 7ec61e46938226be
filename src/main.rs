// Copyright 2026 Gramlens Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gramlens::config::ScrapeConfig;
use gramlens::renderer::chromium::{self, ChromiumRenderer, LaunchOptions};
use gramlens::renderer::Renderer;
use gramlens::rest::AppState;
use gramlens::{batch, rest, session};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "gramlens",
    about = "Gramlens — engagement metadata extraction for Instagram content",
    version,
    after_help = "Run 'gramlens <command> --help' for details on each command."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "7860")]
        port: u16,
    },
    /// Scrape a batch of URLs and print the results as JSON
    Scrape {
        /// URLs to process (comma/newline-delimited blobs accepted)
        urls: Vec<String>,
    },
    /// Log in interactively and persist the session blob
    Login,
    /// Check environment and diagnose issues
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Serve { port } => serve(port).await,
        Commands::Scrape { urls } => scrape(&urls).await,
        Commands::Login => login().await,
        Commands::Doctor => doctor(),
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "gramlens=debug" } else { "gramlens=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().expect("valid directive")),
        )
        .init();
}

/// Launch the engine once and check the session-blob policy. Shared by the
/// serve and scrape entry points.
async fn bring_up(cfg: &ScrapeConfig) -> Result<Arc<dyn Renderer>> {
    if cfg.require_session && !cfg.session_file.exists() {
        bail!(
            "session blob {} is required but missing; run 'gramlens login' first",
            cfg.session_file.display()
        );
    }
    let renderer = ChromiumRenderer::launch(LaunchOptions {
        headless: true,
        block_media: cfg.block_media,
    })
    .await
    .context("failed to launch browser engine")?;
    Ok(Arc::new(renderer))
}

async fn serve(port: u16) -> Result<()> {
    let cfg = ScrapeConfig::from_env();
    let renderer = bring_up(&cfg).await?;
    info!("gramlens v{} serving", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState {
        renderer,
        config: cfg,
    });
    rest::start(port, state).await
}

async fn scrape(raw_urls: &[String]) -> Result<()> {
    let urls = rest::normalize_urls(&serde_json::json!(raw_urls));
    if urls.is_empty() {
        bail!("no valid URLs provided");
    }

    let cfg = ScrapeConfig::from_env();
    let renderer = bring_up(&cfg).await?;
    let results = batch::run_batch(renderer, &urls, &cfg).await;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn login() -> Result<()> {
    let cfg = ScrapeConfig::from_env();
    // Five minutes to type a password and clear any checkpoint prompt.
    chromium::interactive_login(&cfg.session_file, 300_000).await
}

fn doctor() -> Result<()> {
    let cfg = ScrapeConfig::from_env();

    match chromium::find_chromium() {
        Some(path) => println!("chromium: {}", path.display()),
        None => println!("chromium: NOT FOUND (set GRAMLENS_CHROMIUM_PATH)"),
    }

    match session::SessionState::load_if_present(&cfg.session_file) {
        Ok(Some(state)) => println!(
            "session blob: {} ({} cookies, saved {})",
            cfg.session_file.display(),
            state.cookies.len(),
            state.saved_at
        ),
        Ok(None) => println!(
            "session blob: absent ({}) — anonymous scraping only",
            cfg.session_file.display()
        ),
        Err(e) => println!("session blob: unreadable ({e})"),
    }

    println!(
        "config: workers={} nav_timeout={}ms capture_window={}ms",
        cfg.workers,
        cfg.nav_timeout_ms,
        cfg.capture_window_ms()
    );
    Ok(())
}
