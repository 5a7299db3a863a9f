//! Deploywatch daemon.
//!
//! Loads config, starts the refresh poller, and serves table queries on a
//! Unix socket until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use deploywatch::api::{key_preview, HttpTransport};
use deploywatch::cache::SnapshotCache;
use deploywatch::config::Config;
use deploywatch::error::ConfigError;
use deploywatch::fetch::FetchEngine;
use deploywatch::poller::run_poller;
use deploywatch::query::QueryHandler;
use deploywatch::server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (structured logs)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deploywatch=info".into()),
        )
        .with_target(false)
        .init();

    info!("🛰️ Deploywatch v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(c) => c,
        Err(e @ ConfigError::MissingApiKey(_)) => {
            // Nothing to poll without credentials
            error!("{} — disabling", e);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };

    info!(
        base_url = %config.base_url,
        api_key = %key_preview(&config.api_key),
        update_every_secs = config.update_every.as_secs(),
        timeout_secs = config.timeout.as_secs(),
        source = ?config.query_source,
        "⚙️ Configuration loaded"
    );

    // ── Fetch Engine ────────────────────────────────────────────────
    let transport = HttpTransport::new(&config.base_url).context("Failed to build HTTP client")?;
    let engine = Arc::new(
        FetchEngine::new(
            Arc::new(transport),
            config.api_key.clone(),
            config.timeout,
            config.parallelism,
        )
        .context("Invalid fetch settings")?,
    );
    let cache = Arc::new(SnapshotCache::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Refresh Poller ──────────────────────────────────────────────
    let poller = tokio::spawn(run_poller(
        Arc::clone(&engine),
        Arc::clone(&cache),
        config.update_every,
        shutdown_rx.clone(),
    ));

    // ── Shutdown ────────────────────────────────────────────────────
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    // ── Server ──────────────────────────────────────────────────────
    let handler = Arc::new(QueryHandler::new(
        engine,
        cache,
        config.query_source,
        config.update_every,
        shutdown_rx.clone(),
    ));
    let server = Server::new(config.socket_path.clone(), handler);
    server.run(shutdown_rx).await.context("Server failed")?;

    let _ = poller.await;
    info!("👋 Deploywatch stopped");
    Ok(())
}

/// Ctrl-C, or SIGTERM on Unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
