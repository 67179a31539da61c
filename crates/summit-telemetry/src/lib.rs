//! # Summit Telemetry
//!
//! Logging and metrics shared by the Summit chain services.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` registry with an env filter and either
//!   a pretty or a JSON formatter
//! - **Metrics**: Prometheus counters for the remark ingestion pipeline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use summit_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SUMMIT_SERVICE_NAME` | `summit-chain` | Service name attached to logs |
//! | `SUMMIT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `SUMMIT_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `SUMMIT_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BLOCKS_PROCESSED, DUPLICATES_SKIPPED,
    EMERGENCIES_PERSISTED, HEALTH_ADVISORIES, INGESTION_ERRORS, PAYLOADS_REJECTED,
    REMARKS_DECODED, REMARKS_UNDECODABLE, SUBSCRIBE_ATTEMPTS, TRANSPORT_FALLBACKS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// A collector could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Configuration was rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register all metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logging = init_logging(config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
