//! # Inbound Ports
//!
//! API trait defining what the ingestion service can do, and the observer
//! callers implement to hear about it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::algorithms::HealthAdvisory;
use crate::config::TransportConfig;
use crate::domain::{ChainEventRecord, ClassifiedError, EmergencyPayload, SessionState, SetupError};

/// Callbacks for a listener session. Every method defaults to a no-op.
///
/// Callbacks run on the runtime's worker threads and must not block.
pub trait IngestionObserver: Send + Sync {
    /// A `System.Remarked` event was observed.
    fn on_event_received(&self, _record: &ChainEventRecord) {}

    /// A new emergency was persisted.
    fn on_emergency_received(&self, _payload: &EmergencyPayload) {}

    /// A block notification finished processing.
    fn on_block_processed(&self, _block_number: u64, _event_count: usize) {}

    /// A transient or fatal error occurred.
    fn on_error(&self, _error: &ClassifiedError) {}

    /// The session has been silent longer than the configured threshold.
    fn on_health_advisory(&self, _advisory: &HealthAdvisory) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl IngestionObserver for NoopObserver {}

/// Remark ingestion API - inbound port.
#[async_trait]
pub trait RemarkIngestionApi: Send + Sync {
    /// Start listening. A no-op when already listening with the same
    /// transport and filter; otherwise the previous session is stopped
    /// first.
    async fn start(
        &self,
        transport: TransportConfig,
        filter_account: Option<String>,
        observer: Arc<dyn IngestionObserver>,
    ) -> Result<(), SetupError>;

    /// Stop listening. Idempotent. A start still establishing its
    /// transport returns [`SetupError::Cancelled`].
    async fn stop(&self);

    /// Whether a session is listening.
    fn is_listening(&self) -> bool;

    /// Observed remark events, newest first.
    fn get_history(&self) -> Vec<ChainEventRecord>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;
}
