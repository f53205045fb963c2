use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::http::{Request, Response};
use tower::{Layer, Service};

use super::recorder::Recorder;
use crate::metrics::Stats;

/// Tower layer that reports every request/response pair to a [`Stats`].
///
/// ```ignore
/// Router::new()
///     .route("/hello", get(hello))
///     .layer(StatsLayer::new(stats.clone()))
/// ```
#[derive(Clone)]
pub struct StatsLayer {
    stats: Arc<Stats>,
}

impl StatsLayer {
    pub fn new(stats: Arc<Stats>) -> Self {
        Self { stats }
    }
}

impl<S> Layer<S> for StatsLayer {
    type Service = StatsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatsService::new(inner, self.stats.clone())
    }
}

/// The wrapped service produced by [`StatsLayer`].
///
/// Only a response head reaching this service counts as a completion.
/// Inner errors, dropped futures and `101` upgrades are not recorded.
#[derive(Clone)]
pub struct StatsService<S> {
    inner: S,
    stats: Arc<Stats>,
}

impl<S> StatsService<S> {
    pub fn new(inner: S, stats: Arc<Stats>) -> Self {
        Self { inner, stats }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for StatsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut recorder = Recorder::begin();
        let stats = self.stats.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let response = fut.await?;
            recorder.observe(&response);
            stats.end(&recorder);
            Ok(response)
        })
    }
}
