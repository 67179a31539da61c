//! Prometheus metrics for the Summit chain services.
//!
//! All metrics follow the naming convention: `summit_<component>_<metric>_<unit>`
//!
//! Counters work whether or not they have been registered; registration only
//! makes them visible to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INGESTION METRICS
    // =========================================================================

    /// Block notifications fully processed
    pub static ref BLOCKS_PROCESSED: Counter = Counter::new(
        "summit_ingest_blocks_processed_total",
        "Total block notifications processed by the remark pipeline"
    ).expect("metric creation failed");

    /// Remarks normalized to text
    pub static ref REMARKS_DECODED: Counter = Counter::new(
        "summit_ingest_remarks_decoded_total",
        "Total remark arguments normalized to UTF-8 text"
    ).expect("metric creation failed");

    /// Remarks no strategy could decode
    pub static ref REMARKS_UNDECODABLE: Counter = Counter::new(
        "summit_ingest_remarks_undecodable_total",
        "Total remark arguments that could not be normalized"
    ).expect("metric creation failed");

    /// Envelopes that matched the prefix but failed validation
    pub static ref PAYLOADS_REJECTED: Counter = Counter::new(
        "summit_ingest_payloads_rejected_total",
        "Total emergency envelopes rejected by field validation"
    ).expect("metric creation failed");

    /// Emergencies written to the store
    pub static ref EMERGENCIES_PERSISTED: Counter = Counter::new(
        "summit_ingest_emergencies_persisted_total",
        "Total emergency records persisted"
    ).expect("metric creation failed");

    /// Duplicate detections
    pub static ref DUPLICATES_SKIPPED: CounterVec = CounterVec::new(
        Opts::new("summit_ingest_duplicates_skipped_total", "Duplicate emergencies skipped"),
        &["source"]  // source: memory/store
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT & HEALTH METRICS
    // =========================================================================

    /// Subscription attempts
    pub static ref SUBSCRIBE_ATTEMPTS: CounterVec = CounterVec::new(
        Opts::new("summit_transport_subscribe_attempts_total", "Transport subscription attempts"),
        &["outcome"]  // outcome: success/failed
    ).expect("metric creation failed");

    /// Fallbacks from streaming to polling
    pub static ref TRANSPORT_FALLBACKS: Counter = Counter::new(
        "summit_transport_fallbacks_total",
        "Total fallbacks from the streaming backend to polling"
    ).expect("metric creation failed");

    /// Silence advisories raised by the health monitor
    pub static ref HEALTH_ADVISORIES: Counter = Counter::new(
        "summit_health_advisories_total",
        "Total silence advisories raised"
    ).expect("metric creation failed");

    // =========================================================================
    // ERROR METRICS
    // =========================================================================

    /// Errors by classification
    pub static ref INGESTION_ERRORS: CounterVec = CounterVec::new(
        Opts::new("summit_ingest_errors_total", "Errors by classification"),
        &["class"]  // class: ignorable/transient/fatal
    ).expect("metric creation failed");
}

/// Handle to the registry the metrics were registered with
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Ingestion
        Box::new(BLOCKS_PROCESSED.clone()),
        Box::new(REMARKS_DECODED.clone()),
        Box::new(REMARKS_UNDECODABLE.clone()),
        Box::new(PAYLOADS_REJECTED.clone()),
        Box::new(EMERGENCIES_PERSISTED.clone()),
        Box::new(DUPLICATES_SKIPPED.clone()),
        // Transport & health
        Box::new(SUBSCRIBE_ATTEMPTS.clone()),
        Box::new(TRANSPORT_FALLBACKS.clone()),
        Box::new(HEALTH_ADVISORIES.clone()),
        // Errors
        Box::new(INGESTION_ERRORS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
