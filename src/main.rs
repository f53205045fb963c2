use std::sync::Arc;

use anyhow::Context;
use http_stats::config::ServerConfig;
use http_stats::metrics::Stats;
use http_stats::server::{self, AppState};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── 1. Configuration ─────────────────────────────────────────
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // ── 2. Build shared state ────────────────────────────────────
    let stats = Arc::new(Stats::new(&config.stats));
    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        stats: stats.clone(),
        stream_interval: config.stats.reset_interval,
        shutdown: shutdown.clone(),
    });

    // ── 3. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 4. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.addr))?;

    info!(addr = %config.addr, "server listening");
    info!("stats JSON → http://{}/stats", config.addr);
    info!("stats SSE  → http://{}/stats/stream", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("server exited with error")?;

    // ── 5. Tear down ─────────────────────────────────────────────
    stats.shutdown().await;
    info!("shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C and cancels `shutdown` so long-lived streams close
/// and the server can drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, shutting down");
    shutdown.cancel();
}
