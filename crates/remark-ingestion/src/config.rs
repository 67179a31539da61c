//! # Ingestion Configuration
//!
//! Service-level settings ([`IngestionConfig`]) and per-session transport
//! settings ([`TransportConfig`]).

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::SetupError;

/// Default deduplicator capacity.
pub const DEFAULT_DEDUP_CAPACITY: usize = 500;

/// Default history length.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Which remark sources are scanned in addition to `Remarked` events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrinsicScanMode {
    /// Only events carrying the remark inline are decoded.
    Off,
    /// Fetch the block body when a `Remarked` event lacks its argument.
    #[default]
    Fallback,
    /// Also scan every remark extrinsic of every notified block.
    Always,
}

impl FromStr for ExtrinsicScanMode {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "fallback" => Ok(Self::Fallback),
            "always" => Ok(Self::Always),
            _ => Err(SetupError::InvalidConfig(format!("unknown scan mode '{}'", s))),
        }
    }
}

/// Ingestion service configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Processed-event keys remembered before truncation.
    pub dedup_capacity: usize,

    /// Entries kept by `get_history`.
    pub history_capacity: usize,

    /// Health check period in seconds.
    pub health_check_interval_secs: u64,

    /// Silence tolerated before an advisory, in seconds.
    pub silence_threshold_secs: u64,

    /// Capacity of the transport-to-dispatcher channel.
    pub notification_buffer: usize,

    /// Extrinsic scanning behavior.
    pub extrinsic_scan: ExtrinsicScanMode,

    /// Consult the store for an existing record before writing.
    pub precheck_store: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            health_check_interval_secs: 60,
            silence_threshold_secs: 120,
            notification_buffer: 256,
            extrinsic_scan: ExtrinsicScanMode::Fallback,
            precheck_store: true,
        }
    }
}

impl IngestionConfig {
    /// Create a config for testing (smaller values).
    pub fn for_testing() -> Self {
        Self {
            dedup_capacity: 16,
            history_capacity: 8,
            notification_buffer: 16,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REMARK_DEDUP_CAPACITY` (default: 500)
    /// - `REMARK_HISTORY_CAPACITY` (default: 100)
    /// - `REMARK_HEALTH_INTERVAL_SECS` (default: 60)
    /// - `REMARK_SILENCE_THRESHOLD_SECS` (default: 120)
    /// - `REMARK_NOTIFICATION_BUFFER` (default: 256)
    /// - `REMARK_EXTRINSIC_SCAN`: off, fallback or always (default: fallback)
    /// - `REMARK_PRECHECK_STORE` (default: true)
    pub fn from_env() -> Result<Self, SetupError> {
        let defaults = Self::default();
        Ok(Self {
            dedup_capacity: env_parse("REMARK_DEDUP_CAPACITY")?.unwrap_or(defaults.dedup_capacity),
            history_capacity: env_parse("REMARK_HISTORY_CAPACITY")?
                .unwrap_or(defaults.history_capacity),
            health_check_interval_secs: env_parse("REMARK_HEALTH_INTERVAL_SECS")?
                .unwrap_or(defaults.health_check_interval_secs),
            silence_threshold_secs: env_parse("REMARK_SILENCE_THRESHOLD_SECS")?
                .unwrap_or(defaults.silence_threshold_secs),
            notification_buffer: env_parse("REMARK_NOTIFICATION_BUFFER")?
                .unwrap_or(defaults.notification_buffer),
            extrinsic_scan: match env::var("REMARK_EXTRINSIC_SCAN") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.extrinsic_scan,
            },
            precheck_store: env::var("REMARK_PRECHECK_STORE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.precheck_store),
        })
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.health_check_interval_secs == 0 {
            return Err(SetupError::InvalidConfig("health check interval must be > 0".into()));
        }
        if self.notification_buffer == 0 {
            return Err(SetupError::InvalidConfig("notification buffer must be > 0".into()));
        }
        Ok(())
    }

    /// Health check period.
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Silence threshold.
    pub fn silence_threshold(&self) -> Duration {
        Duration::from_secs(self.silence_threshold_secs)
    }
}

/// Preferred transport backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// New-head subscription, falling back to polling.
    #[default]
    Streaming,
    /// Polling only.
    Polling,
}

/// Exponential backoff for subscription attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts before giving up (at least 1).
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Growth factor between retries.
    pub multiplier: u32,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            multiplier: 2,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = u64::from(self.multiplier).saturating_pow(exponent);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Transport settings for one listener session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Node endpoint.
    pub endpoint: String,
    /// Preferred backend.
    pub kind: TransportKind,
    /// Subscription retry policy.
    pub retry: RetryPolicy,
    /// Polling period in seconds.
    pub poll_interval_secs: u64,
    /// Blocks caught up per polling tick.
    pub max_catch_up_blocks: u64,
}

impl TransportConfig {
    /// Streaming config with default policy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind: TransportKind::Streaming,
            retry: RetryPolicy::default(),
            poll_interval_secs: 6,
            max_catch_up_blocks: 10,
        }
    }

    /// Polling-only config.
    pub fn polling(endpoint: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Polling,
            ..Self::new(endpoint)
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REMARK_ENDPOINT` (default: ws://127.0.0.1:9944)
    /// - `REMARK_TRANSPORT`: streaming or polling (default: streaming)
    /// - `REMARK_POLL_INTERVAL_SECS` (default: 6)
    /// - `REMARK_MAX_CATCH_UP` (default: 10)
    pub fn from_env() -> Result<Self, SetupError> {
        let mut config =
            Self::new(env::var("REMARK_ENDPOINT").unwrap_or_else(|_| "ws://127.0.0.1:9944".into()));
        if let Ok(kind) = env::var("REMARK_TRANSPORT") {
            config.kind = match kind.to_lowercase().as_str() {
                "streaming" => TransportKind::Streaming,
                "polling" => TransportKind::Polling,
                other => {
                    return Err(SetupError::InvalidConfig(format!("unknown transport '{}'", other)))
                }
            };
        }
        if let Some(secs) = env_parse("REMARK_POLL_INTERVAL_SECS")? {
            config.poll_interval_secs = secs;
        }
        if let Some(max) = env_parse("REMARK_MAX_CATCH_UP")? {
            config.max_catch_up_blocks = max;
        }
        Ok(config)
    }

    /// Reject values no backend can run with.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.endpoint.trim().is_empty() {
            return Err(SetupError::InvalidConfig("endpoint is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(SetupError::InvalidConfig("retry policy needs at least one attempt".into()));
        }
        if self.poll_interval_secs == 0 || self.max_catch_up_blocks == 0 {
            return Err(SetupError::InvalidConfig(
                "poll interval and catch-up window must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Polling period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, SetupError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SetupError::InvalidConfig(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
