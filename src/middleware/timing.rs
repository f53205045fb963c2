use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::recorder::Recorder;
use crate::metrics::Stats;

/// `axum::middleware::from_fn_with_state` flavour of [`StatsLayer`](super::StatsLayer).
///
/// Records the request into `stats` and logs a one-liner per API call.
pub async fn stats_middleware(
    State(stats): State<Arc<Stats>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let mut recorder = Recorder::begin();
    let response = next.run(req).await;
    recorder.observe(&response);
    let recorded = stats.end(&recorder);

    // Skip the SSE feed, it stays open for the life of the client
    if let (Some(elapsed), false) = (recorded, path.ends_with("/stream")) {
        debug!(
            status = response.status().as_u16(),
            %method,
            path = %path,
            elapsed_us = elapsed.as_micros() as u64,
            "request completed"
        );
    }

    response
}
