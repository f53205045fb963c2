use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;

use super::snapshot::StatsSnapshot;
use crate::server::AppState;

/// SSE comment sent while no snapshot is due, keeps proxies from timing out.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// `GET /stats`
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

/// `GET /stats/stream`: one JSON snapshot per `stream_interval` as
/// Server-Sent Events.
///
/// The feed ends once `AppState::shutdown` is cancelled, so an attached
/// client never holds up graceful shutdown.
pub async fn stats_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ticks = IntervalStream::new(tokio::time::interval(state.stream_interval));
    let stop = state.shutdown.clone().cancelled_owned();

    let events = ticks.take_until(stop).map(move |_| {
        let json = serde_json::to_string(&state.stats.snapshot()).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive"))
}
