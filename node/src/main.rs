// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bitcoin Places Node
//!
//! Entry point for the `places-node` binary. Parses CLI arguments,
//! initializes logging, and dispatches to a subcommand:
//!
//! - `derive`  — place a hash near a reference, offline
//! - `show`    — fetch a block by height or named jump and place it
//! - `jumps`   — print the quick-jump heights for the current tip
//! - `serve`   — run the HTTP API
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use places_protocol::network::{
    BlockSource, HeightNavigator, HttpBlockSource, Jump, NavigatorConfig, Selection,
};
use places_protocol::{derive, BlockCache, BlockHash, BlockPlace};

use cli::{Commands, PlacesNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PlacesNodeCli::parse();
    logging::init_logging(
        "places_node=info,places_protocol=info,tower_http=info",
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Derive(args) => derive_hash(args),
        Commands::Show(args) => show_block(args).await,
        Commands::Jumps(args) => print_jumps(args).await,
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds a navigator over the HTTP block source described by `args`.
fn build_navigator(args: &cli::SourceArgs, debounce: Duration) -> Result<Arc<HeightNavigator>> {
    let source = HttpBlockSource::new(args.source_config())
        .with_context(|| format!("failed to build HTTP client for {}", args.api_url))?;
    let source: Arc<dyn BlockSource> = Arc::new(source);
    Ok(Arc::new(HeightNavigator::new(
        source,
        Arc::new(BlockCache::new()),
        NavigatorConfig { debounce },
    )))
}

/// Prints the coordinate for a hash. Never touches the network.
fn derive_hash(args: cli::DeriveArgs) -> Result<()> {
    let hash = BlockHash::parse(&args.hash).context("invalid block hash")?;
    let reference = args.reference.coordinate();
    let coordinate = derive(&hash, reference)?;

    tracing::debug!(%hash, %reference, %coordinate, "derived");
    println!("{},{}", coordinate.lat, coordinate.lng);
    Ok(())
}

/// Fetches one block and prints its place as JSON.
async fn show_block(args: cli::ShowArgs) -> Result<()> {
    // One-shot command: nothing to debounce.
    let navigator = build_navigator(&args.source, Duration::ZERO)?;

    let selection = match (args.height, args.jump) {
        (Some(height), _) => navigator.select_height(height).await,
        (None, jump) => navigator
            .select_jump(jump.unwrap_or(Jump::Current))
            .await
            .context("failed to load tip height")?,
    };

    let record = match selection {
        Selection::Resolved(record) => record,
        Selection::Failed { height, error } => {
            bail!("{}: block {height}: {error}", api::NO_DATA_MESSAGE)
        }
        Selection::Superseded => bail!("selection was cancelled"),
    };

    let place = BlockPlace::locate(&record, args.reference.coordinate())?;
    println!("{}", serde_json::to_string_pretty(&place)?);
    Ok(())
}

/// Prints the quick-jump heights as JSON.
async fn print_jumps(args: cli::SourceArgs) -> Result<()> {
    let navigator = build_navigator(&args, Duration::ZERO)?;
    let jumps = navigator
        .load_tip()
        .await
        .context("failed to load tip height")?;
    println!("{}", serde_json::to_string_pretty(&jumps)?);
    Ok(())
}

/// Runs the HTTP API until SIGINT or SIGTERM.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    let navigator = build_navigator(&args.source, Duration::from_millis(args.debounce_ms))?;
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .cached_blocks
        .set(navigator.cache().len() as i64);

    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        api_url: args.source.api_url.clone(),
        started_at: chrono::Utc::now(),
        navigator: Arc::clone(&navigator),
        reference: args.reference.coordinate(),
        metrics: node_metrics,
    };

    // Warm the tip so the first /jumps call is instant. Failure is not
    // fatal; the handler retries.
    {
        let navigator = Arc::clone(&navigator);
        tokio::spawn(async move {
            if let Err(e) = navigator.load_tip().await {
                tracing::warn!(error = %e, "tip height not available at startup");
            }
        });
    }

    let router = api::create_router(app_state);
    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", addr))?;
    tracing::info!(
        %addr,
        api_url = %args.source.api_url,
        reference = %args.reference.coordinate(),
        "places-node listening"
    );

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    navigator.cancel();
    tracing::info!("places-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("places-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
