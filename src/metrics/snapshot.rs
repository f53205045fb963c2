use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local, SecondsFormat};
use serde::Serialize;

/// Point-in-time view of a [`Stats`](super::Stats) instance.
///
/// Built fresh on every read and owns all of its data, so later
/// updates to the aggregator never show through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub pid: u32,
    #[serde(skip)]
    pub started_at: DateTime<Local>,
    pub uptime: String,
    pub uptime_sec: f64,
    pub time: String,
    pub unixtime: i64,

    // Histograms keyed by decimal status code
    pub status_code_count: BTreeMap<String, u64>,
    pub total_status_code_count: BTreeMap<String, u64>,
    pub count: u64,
    pub total_count: u64,

    // Latency
    pub total_response_time: String,
    pub total_response_time_sec: f64,
    pub average_response_time: String,
    pub average_response_time_sec: f64,
}

impl StatsSnapshot {
    pub(crate) fn build(
        pid: u32,
        started_at: DateTime<Local>,
        uptime: Duration,
        now: DateTime<Local>,
        status_code_count: BTreeMap<String, u64>,
        total_status_code_count: BTreeMap<String, u64>,
        total_response_time: Duration,
    ) -> Self {
        let count = status_code_count.values().sum();
        let total_count = total_status_code_count.values().sum();
        let average = average_duration(total_response_time, total_count);

        Self {
            pid,
            started_at,
            uptime: format_duration(uptime),
            uptime_sec: uptime.as_secs_f64(),
            time: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            unixtime: now.timestamp(),
            status_code_count,
            total_status_code_count,
            count,
            total_count,
            total_response_time: format_duration(total_response_time),
            total_response_time_sec: total_response_time.as_secs_f64(),
            average_response_time: format_duration(average),
            average_response_time_sec: average.as_secs_f64(),
        }
    }
}

/// `total / count`, or zero when nothing has been recorded yet.
fn average_duration(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

// ─── Human-readable durations ────────────────────────────────────

/// Compact duration string: `0s`, `850ns`, `1.5µs`, `12.25ms`,
/// `4.2s`, `2m0s`, `1h2m3.5s`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_owned();
    }

    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos / 1_000, nanos % 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos / 1_000_000, nanos % 1_000_000, 6));
    }

    let total_secs = d.as_secs();
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let secs = decimal(
        u128::from(total_secs % 60),
        u128::from(d.subsec_nanos()),
        9,
    );

    if hours > 0 {
        format!("{hours}h{minutes}m{secs}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs}s")
    } else {
        format!("{secs}s")
    }
}

/// `whole.frac` with `frac` zero-padded to `digits` and trailing zeros trimmed.
fn decimal(whole: u128, frac: u128, digits: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
