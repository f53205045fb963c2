use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, Response, StatusCode},
    response::IntoResponse,
};

// ─── Recorder ────────────────────────────────────────────────────

/// Per-request observer: start time plus the first committed status.
///
/// A status is latched once, the way HTTP sends a response head once.
/// A `101 Switching Protocols` head or an explicit `hijack()` before any
/// commit marks the request as taken over, and it will not be counted.
#[derive(Debug, Clone)]
pub struct Recorder {
    started_at: Instant,
    status: Option<u16>,
    hijacked: bool,
}

impl Recorder {
    pub fn begin() -> Self {
        Self {
            started_at: Instant::now(),
            status: None,
            hijacked: false,
        }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Latch `status` unless something was already committed.
    pub fn write_header(&mut self, status: u16) {
        if self.status.is_some() || self.hijacked {
            return;
        }
        if status == StatusCode::SWITCHING_PROTOCOLS.as_u16() {
            self.hijacked = true;
        } else {
            self.status = Some(status);
        }
    }

    /// A body write without a prior header commits an implicit 200.
    pub fn write_body(&mut self) {
        self.write_header(StatusCode::OK.as_u16());
    }

    /// The handler took over the connection.
    pub fn hijack(&mut self) {
        if self.status.is_none() {
            self.hijacked = true;
        }
    }

    /// Commit whatever head the wrapped service produced.
    pub fn observe<B>(&mut self, response: &Response<B>) {
        self.write_header(response.status().as_u16());
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_hijacked(&self) -> bool {
        self.hijacked
    }

    /// The status to count, or `None` if this request must be skipped.
    pub fn completed_status(&self) -> Option<u16> {
        if self.hijacked {
            None
        } else {
            self.status
        }
    }
}

// ─── Response sinks ──────────────────────────────────────────────

/// Write side of an HTTP response for handlers that stream into a sink
/// instead of returning a `Response` value.
pub trait ResponseSink {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    fn write(&mut self, chunk: &[u8]);

    fn hijack(&mut self);
}

/// Decorator that forwards every call to `S` and latches the status into
/// a [`Recorder`] on the way through.
#[derive(Debug)]
pub struct RecordingSink<S> {
    inner: S,
    recorder: Recorder,
}

impl<S: ResponseSink> RecordingSink<S> {
    pub fn begin(inner: S) -> Self {
        Self {
            inner,
            recorder: Recorder::begin(),
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn into_parts(self) -> (S, Recorder) {
        (self.inner, self.recorder)
    }
}

impl<S: ResponseSink> ResponseSink for RecordingSink<S> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.inner.write_header(status);
        self.recorder.write_header(status.as_u16());
    }

    fn write(&mut self, chunk: &[u8]) {
        self.inner.write(chunk);
        self.recorder.write_body();
    }

    fn hijack(&mut self) {
        self.inner.hijack();
        self.recorder.hijack();
    }
}

/// In-memory sink that turns into an axum `Response`.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    hijacked: bool,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseSink for ResponseBuffer {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        // Superfluous header writes are ignored
        if self.status.is_none() && !self.hijacked {
            self.status = Some(status);
        }
    }

    fn write(&mut self, chunk: &[u8]) {
        if self.hijacked {
            return;
        }
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(chunk);
    }

    fn hijack(&mut self) {
        if self.status.is_none() {
            self.hijacked = true;
        }
    }
}

impl IntoResponse for ResponseBuffer {
    fn into_response(self) -> axum::response::Response {
        let status = if self.hijacked {
            StatusCode::SWITCHING_PROTOCOLS
        } else {
            self.status.unwrap_or(StatusCode::OK)
        };

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}
