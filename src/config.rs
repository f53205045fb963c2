use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ─── Defaults ────────────────────────────────────────────────────

/// How often the windowed status-code histogram is emptied.
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

const ENV_ADDR: &str = "HTTP_STATS_ADDR";
const ENV_RESET_INTERVAL_MS: &str = "HTTP_STATS_RESET_INTERVAL_MS";

// ─── Errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var} \"{value}\": {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("reset interval must be greater than zero")]
    ZeroResetInterval,
}

// ─── Aggregator settings ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatsConfig {
    /// Window length for `status_code_count` (milliseconds on the wire)
    #[serde(
        rename = "reset_interval_ms",
        default = "default_reset_interval",
        deserialize_with = "deserialize_millis"
    )]
    pub reset_interval: Duration,
}

fn default_reset_interval() -> Duration {
    DEFAULT_RESET_INTERVAL
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            reset_interval: DEFAULT_RESET_INTERVAL,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reset_interval.is_zero() {
            return Err(ConfigError::ZeroResetInterval);
        }
        Ok(())
    }
}

// ─── Demo host settings ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub stats: StatsConfig,
}

impl ServerConfig {
    /// Reads `HTTP_STATS_ADDR` and `HTTP_STATS_RESET_INTERVAL_MS`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr_raw = lookup(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = addr_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnv {
                var: ENV_ADDR,
                value: addr_raw.clone(),
                reason: e.to_string(),
            })?;

        let stats = match lookup(ENV_RESET_INTERVAL_MS) {
            Some(raw) => {
                let ms = raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnv {
                    var: ENV_RESET_INTERVAL_MS,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
                StatsConfig {
                    reset_interval: Duration::from_millis(ms),
                }
            }
            None => StatsConfig::default(),
        };
        stats.validate()?;

        Ok(Self { addr, stats })
    }
}
