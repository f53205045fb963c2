use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::snapshot::StatsSnapshot;
use crate::config::{StatsConfig, DEFAULT_RESET_INTERVAL};
use crate::middleware::Recorder;

// ─── Public types ────────────────────────────────────────────────

/// Shared request-metrics aggregator.
///
/// The wrap middleware calls `end()` once per request, `/stats` calls
/// `snapshot()`. A background task empties the windowed histogram every
/// `reset_interval` until `shutdown()` is awaited or the aggregator is
/// dropped.
pub struct Stats {
    pid: u32,
    started_at: Instant,
    started_wall: DateTime<Local>,
    counters: Arc<RwLock<Counters>>,
    shutdown: CancellationToken,
    rotation: Mutex<Option<JoinHandle<()>>>,
}

// ─── Internal state ──────────────────────────────────────────────

/// Everything that mutates. Always read and written as one unit.
#[derive(Debug, Default)]
struct Counters {
    // Completed requests since the last rotation
    window: BTreeMap<String, u64>,
    // Completed requests since start, never reset
    total: BTreeMap<String, u64>,
    total_response_time: Duration,
}

impl Counters {
    fn apply(&mut self, status: u16, elapsed: Duration) {
        let key = status.to_string();
        *self.window.entry(key.clone()).or_default() += 1;
        *self.total.entry(key).or_default() += 1;
        self.total_response_time = self.total_response_time.saturating_add(elapsed);
    }
}

// ─── Stats impl ──────────────────────────────────────────────────

impl Stats {
    /// Creates an aggregator and starts its window-rotation task.
    ///
    /// Must be called from within a Tokio runtime. An invalid config
    /// (zero interval) falls back to the default one-second window.
    pub fn new(config: &StatsConfig) -> Self {
        let period = match config.validate() {
            Ok(()) => config.reset_interval,
            Err(e) => {
                warn!(
                    error = %e,
                    fallback_ms = DEFAULT_RESET_INTERVAL.as_millis() as u64,
                    "invalid stats config, using default reset interval"
                );
                DEFAULT_RESET_INTERVAL
            }
        };

        let counters = Arc::new(RwLock::new(Counters::default()));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(rotate_window(counters.clone(), period, shutdown.clone()));

        Self {
            pid: std::process::id(),
            started_at: Instant::now(),
            started_wall: Local::now(),
            counters,
            shutdown,
            rotation: Mutex::new(Some(handle)),
        }
    }

    /// Same as `new` with the default one-second window.
    pub fn with_defaults() -> Self {
        Self::new(&StatsConfig::default())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_wall
    }

    /// Record one finished request that started at `start`.
    pub fn record_completion(&self, start: Instant, status: u16) {
        self.record_elapsed(start.elapsed(), status);
    }

    /// Record one finished request whose latency was measured by the caller.
    pub fn record_elapsed(&self, elapsed: Duration, status: u16) {
        self.counters.write().apply(status, elapsed);
        debug!(
            status,
            elapsed_us = elapsed.as_micros() as u64,
            "recorded completion"
        );
    }

    /// Report a request observed through a [`Recorder`].
    ///
    /// Requests that never committed a status (hijacked, upgraded, failed
    /// or cancelled before a response) are not counted. Returns the latency
    /// that was recorded, if any.
    pub fn end(&self, recorder: &Recorder) -> Option<Duration> {
        let Some(status) = recorder.completed_status() else {
            debug!(
                hijacked = recorder.is_hijacked(),
                "no committed status, request not recorded"
            );
            return None;
        };
        let elapsed = recorder.started_at().elapsed();
        self.record_elapsed(elapsed, status);
        Some(elapsed)
    }

    /// Report a request whose outcome the caller already knows.
    pub fn end_with_status(&self, start: Instant, status: u16) {
        self.record_completion(start, status);
    }

    /// Empty the windowed histogram. Cumulative counters are untouched.
    pub fn reset_window(&self) {
        self.counters.write().window.clear();
    }

    /// Produce an owned, point-in-time snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        let (window, total, total_response_time) = {
            let counters = self.counters.read();
            (
                counters.window.clone(),
                counters.total.clone(),
                counters.total_response_time,
            )
        };

        StatsSnapshot::build(
            self.pid,
            self.started_wall,
            self.started_at.elapsed(),
            Local::now(),
            window,
            total,
            total_response_time,
        )
    }

    /// Stop the rotation task and wait for it to exit. Safe to call twice.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.rotation.lock().take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                warn!(error = %e, "stats window rotation task failed");
            }
        }
    }
}

impl Drop for Stats {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ─── Background rotation ─────────────────────────────────────────

async fn rotate_window(
    counters: Arc<RwLock<Counters>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately; the window starts empty anyway
    ticker.tick().await;

    info!(period_ms = period.as_millis() as u64, "stats window rotation started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                counters.write().window.clear();
            }
        }
    }

    info!("stats window rotation stopped");
}
