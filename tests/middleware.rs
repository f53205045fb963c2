use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use http_stats::{
    RecordingSink, ResponseBuffer, ResponseSink, Stats, StatsConfig, StatsLayer, StatsService,
};
use tower::util::ServiceExt;

/// Aggregator whose window won't rotate mid-test.
fn test_stats() -> Arc<Stats> {
    Arc::new(Stats::new(&StatsConfig {
        reset_interval: Duration::from_secs(3_600),
    }))
}

fn counts(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn get_request(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().uri(uri).body(Body::empty())?)
}

// ─── Handlers under test ─────────────────────────────────────────

async fn plain_body() -> &'static str {
    "bar"
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "missing")
}

async fn switch_protocols() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    response
        .headers_mut()
        .insert(header::UPGRADE, "websocket".parse().unwrap());
    response
}

async fn sink_twice() -> ResponseBuffer {
    let mut sink = ResponseBuffer::new();
    sink.write_header(StatusCode::CREATED);
    sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
    sink.write(b"created");
    sink
}

async fn sink_body_only() -> ResponseBuffer {
    let mut sink = ResponseBuffer::new();
    sink.write(b"implicit");
    sink
}

async fn sink_hijack() -> ResponseBuffer {
    let mut sink = ResponseBuffer::new();
    sink.hijack();
    sink
}

fn app(stats: &Arc<Stats>) -> Router {
    Router::new()
        .route("/foo", get(plain_body))
        .route("/missing", get(not_found))
        .route("/ws", get(switch_protocols))
        .route("/sink/twice", get(sink_twice))
        .route("/sink/body", get(sink_body_only))
        .route("/sink/hijack", get(sink_hijack))
        .layer(StatsLayer::new(stats.clone()))
}

// ─── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn records_simple_request() -> Result<()> {
    let stats = test_stats();

    let response = app(&stats).oneshot(get_request("/foo")?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&body[..], b"bar");

    let snap = stats.snapshot();
    assert_eq!(snap.status_code_count, counts(&[("200", 1)]));
    assert_eq!(snap.total_status_code_count, counts(&[("200", 1)]));

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn records_explicit_and_fallback_statuses() -> Result<()> {
    let stats = test_stats();
    let router = app(&stats);

    router.clone().oneshot(get_request("/missing")?).await?;
    router.clone().oneshot(get_request("/no-such-route")?).await?;
    router.oneshot(get_request("/foo")?).await?;

    let snap = stats.snapshot();
    assert_eq!(snap.total_status_code_count, counts(&[("200", 1), ("404", 2)]));
    assert_eq!(snap.total_count, 3);

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn upgraded_connection_is_not_counted() -> Result<()> {
    let stats = test_stats();

    let response = app(&stats).oneshot(get_request("/ws")?).await?;
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    let snap = stats.snapshot();
    assert!(snap.status_code_count.is_empty());
    assert!(snap.total_status_code_count.is_empty());

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn hijacked_sink_is_not_counted() -> Result<()> {
    let stats = test_stats();

    app(&stats).oneshot(get_request("/sink/hijack")?).await?;

    let snap = stats.snapshot();
    assert!(snap.status_code_count.is_empty());
    assert!(snap.total_status_code_count.is_empty());

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn body_without_status_records_200() -> Result<()> {
    let stats = test_stats();

    let response = app(&stats).oneshot(get_request("/sink/body")?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(stats.snapshot().total_status_code_count, counts(&[("200", 1)]));

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn first_committed_status_wins() -> Result<()> {
    let stats = test_stats();

    let response = app(&stats).oneshot(get_request("/sink/twice")?).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(stats.snapshot().total_status_code_count, counts(&[("201", 1)]));

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn inner_error_is_not_counted() -> Result<()> {
    let stats = test_stats();
    let failing = tower::service_fn(|_req: Request<Body>| async {
        Err::<Response<Body>, &'static str>("boom")
    });

    let result = StatsService::new(failing, stats.clone())
        .oneshot(get_request("/")?)
        .await;
    assert_eq!(result.unwrap_err(), "boom");
    assert_eq!(stats.snapshot().total_count, 0);

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn cancelled_request_is_not_counted() -> Result<()> {
    let stats = test_stats();
    let stalled = tower::service_fn(|_req: Request<Body>| async {
        std::future::pending::<Result<Response<Body>, Infallible>>().await
    });

    let call = StatsService::new(stalled, stats.clone()).oneshot(get_request("/")?);
    let outcome = tokio::time::timeout(Duration::from_millis(20), call).await;
    assert!(outcome.is_err());
    assert_eq!(stats.snapshot().total_count, 0);

    stats.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_lose_nothing() -> Result<()> {
    const REQUESTS: u64 = 200;

    let stats = test_stats();
    let router = app(&stats);

    let mut handles = Vec::with_capacity(REQUESTS as usize);
    for _ in 0..REQUESTS {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            router.oneshot(get_request("/foo")?).await?;
            anyhow::Ok(())
        }));
    }
    for h in handles {
        h.await??;
    }

    let snap = stats.snapshot();
    assert_eq!(snap.total_status_code_count, counts(&[("200", REQUESTS)]));
    assert_eq!(snap.total_count, REQUESTS);
    assert!(snap.total_response_time_sec >= 0.0);

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn independent_instances_do_not_share_state() -> Result<()> {
    let first = test_stats();
    let second = test_stats();

    app(&first).oneshot(get_request("/foo")?).await?;

    assert_eq!(first.snapshot().total_count, 1);
    assert_eq!(second.snapshot().total_count, 0);

    first.shutdown().await;
    second.shutdown().await;
    Ok(())
}

// ─── Sink-style handlers ─────────────────────────────────────────

/// Runs `handler` against a recorded in-memory sink and reports it to `stats`.
fn serve_sink<F>(stats: &Stats, handler: F) -> ResponseBuffer
where
    F: FnOnce(&mut RecordingSink<ResponseBuffer>),
{
    let mut sink = RecordingSink::begin(ResponseBuffer::new());
    handler(&mut sink);
    stats.end(sink.recorder());
    sink.into_parts().0
}

#[tokio::test]
async fn recording_sink_reports_first_status() -> Result<()> {
    let stats = test_stats();

    let buffer = serve_sink(&stats, |sink| {
        sink.write_header(StatusCode::CREATED);
        sink.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        sink.write(b"created");
    });
    assert_eq!(buffer.status(), Some(StatusCode::CREATED));

    let snap = stats.snapshot();
    assert_eq!(snap.status_code_count, counts(&[("201", 1)]));
    assert_eq!(snap.total_status_code_count, counts(&[("201", 1)]));

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn recording_sink_reports_implicit_200() -> Result<()> {
    let stats = test_stats();

    let buffer = serve_sink(&stats, |sink| sink.write(b"implicit"));
    assert_eq!(buffer.body(), b"implicit");

    let snap = stats.snapshot();
    assert_eq!(snap.status_code_count, counts(&[("200", 1)]));
    assert_eq!(snap.total_status_code_count, counts(&[("200", 1)]));

    stats.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn recording_sink_skips_hijacked_connection() -> Result<()> {
    let stats = test_stats();

    serve_sink(&stats, |sink| {
        sink.hijack();
        sink.write(b"raw");
    });

    let snap = stats.snapshot();
    assert!(snap.status_code_count.is_empty());
    assert!(snap.total_status_code_count.is_empty());
    assert_eq!(snap.total_count, 0);

    stats.shutdown().await;
    Ok(())
}
