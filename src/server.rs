use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::metrics::{stream, Stats};
use crate::middleware::timing;

/// Shared state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Aggregator fed by the stats middleware and read by `/stats`.
    pub stats: Arc<Stats>,

    /// Tick for the `/stats/stream` SSE feed.
    pub stream_interval: Duration,

    /// Cancelled when the host begins shutting down; ends open SSE feeds.
    pub shutdown: CancellationToken,
}

/// Builds the demo `Router`: one sample endpoint plus the stats endpoints,
/// all of them recorded.
pub fn create_router(state: Arc<AppState>) -> Router {
    let stats = state.stats.clone();

    Router::new()
        // ── Sample endpoint ─────────────────────────────────────
        .route("/hello", get(handlers::hello))
        // ── Stats ───────────────────────────────────────────────
        .route("/stats", get(stream::get_stats))
        .route("/stats/stream", get(stream::stats_stream))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(stats, timing::stats_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
