//! # Notification Pipeline
//!
//! Per-notification processing: detect remarks, normalize, parse,
//! deduplicate, persist, notify.
//!
//! Every failure is contained to the notification that caused it. The
//! active flag is checked right before each side effect, so a stopped
//! session never writes.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use summit_telemetry::{
    BLOCKS_PROCESSED, DUPLICATES_SKIPPED, EMERGENCIES_PERSISTED, HEALTH_ADVISORIES,
    INGESTION_ERRORS, PAYLOADS_REJECTED, REMARKS_DECODED, REMARKS_UNDECODABLE,
};

use crate::algorithms::{
    classified, normalize, parse_detailed, shape_name, Deduplicator, HealthMonitor, RingHistory,
};
use crate::config::{ExtrinsicScanMode, IngestionConfig};
use crate::domain::{
    BlockNotification, ChainEventRecord, EmergencyRecord, EnvelopeError, ErrorClass,
    IngestionError, NormalizedRemark, RemarkArg,
};
use crate::ports::{ChainTransport, EmergencyStore, IngestionObserver, TransportMessage};

/// A remark argument found in a block, with whatever provenance is known.
struct Candidate {
    arg: RemarkArg,
    sender: Option<String>,
    extrinsic_index: Option<u32>,
}

/// Shared state of one listener session's processing.
pub(crate) struct Pipeline {
    transport: Arc<dyn ChainTransport>,
    store: Arc<dyn EmergencyStore>,
    observer: Arc<dyn IngestionObserver>,
    filter_account: Option<String>,
    scan_mode: ExtrinsicScanMode,
    precheck_store: bool,
    dedup: Deduplicator,
    history: RingHistory<ChainEventRecord>,
    health: HealthMonitor,
    active: AtomicBool,
}

impl Pipeline {
    pub(crate) fn new(
        config: &IngestionConfig,
        transport: Arc<dyn ChainTransport>,
        store: Arc<dyn EmergencyStore>,
        observer: Arc<dyn IngestionObserver>,
        filter_account: Option<String>,
    ) -> Self {
        Self {
            transport,
            store,
            observer,
            filter_account,
            scan_mode: config.extrinsic_scan,
            precheck_store: config.precheck_store,
            dedup: Deduplicator::new(config.dedup_capacity),
            history: RingHistory::new(config.history_capacity),
            health: HealthMonitor::new(config.silence_threshold()),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub(crate) fn history(&self) -> Vec<ChainEventRecord> {
        self.history.snapshot()
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.health.is_degraded()
    }

    /// Process one transport message.
    pub(crate) async fn handle(&self, message: TransportMessage) {
        match message {
            TransportMessage::Block(notification) => self.handle_block(notification).await,
            TransportMessage::Fault {
                error,
                block_number,
            } => self.report(error.into(), block_number),
        }
    }

    /// Run one health check, raising an advisory if due.
    pub(crate) fn check_health(&self) {
        if !self.is_active() {
            return;
        }
        if let Some(advisory) = self.health.check(Instant::now()) {
            HEALTH_ADVISORIES.inc();
            warn!(
                silent_secs = advisory.silent_for.as_secs(),
                threshold_secs = advisory.threshold.as_secs(),
                "No chain activity, session degraded"
            );
            self.observer.on_health_advisory(&advisory);
        }
    }

    async fn handle_block(&self, notification: BlockNotification) {
        if !self.is_active() {
            return;
        }
        if self.health.record_activity() {
            info!(block_number = notification.number, "Chain activity resumed");
        }

        let observed_at = Utc::now();
        let block = Some((notification.number, notification.hash));
        // Remarked events whose content must come from the block body.
        let mut unresolved: Vec<(u32, Option<String>)> = Vec::new();

        for event in &notification.events {
            if let (Some(filter), Some(account)) = (&self.filter_account, &event.account) {
                if filter != account {
                    continue;
                }
            }

            let record = ChainEventRecord::observe(event, block, observed_at);
            self.history.push(record.clone());
            if self.is_active() {
                self.observer.on_event_received(&record);
            }

            if !event.is_remarked() {
                continue;
            }
            match (&event.remark, event.extrinsic_index) {
                (Some(arg), extrinsic_index) => {
                    let candidate = Candidate {
                        arg: arg.clone(),
                        sender: event.account.clone(),
                        extrinsic_index,
                    };
                    self.ingest(candidate, &notification, observed_at).await;
                }
                (None, Some(index)) => unresolved.push((index, event.account.clone())),
                (None, None) => {
                    debug!(
                        block_number = notification.number,
                        "Remarked event without content or extrinsic"
                    );
                }
            }
        }

        let scan_all = self.scan_mode == ExtrinsicScanMode::Always;
        let scan_some = self.scan_mode == ExtrinsicScanMode::Fallback && !unresolved.is_empty();
        if scan_all || scan_some {
            self.scan_body(&notification, &unresolved, scan_all, observed_at)
                .await;
        }

        if !self.is_active() {
            return;
        }
        BLOCKS_PROCESSED.inc();
        trace!(
            block_number = notification.number,
            events = notification.events.len(),
            "Block processed"
        );
        self.observer
            .on_block_processed(notification.number, notification.events.len());
    }

    async fn scan_body(
        &self,
        notification: &BlockNotification,
        unresolved: &[(u32, Option<String>)],
        scan_all: bool,
        observed_at: DateTime<Utc>,
    ) {
        let body = match self.transport.fetch_block_body(notification.hash).await {
            Ok(body) => body,
            Err(e) => return self.report(e.into(), Some(notification.number)),
        };

        for extrinsic in &body.extrinsics {
            let event_account = unresolved
                .iter()
                .find(|(index, _)| *index == extrinsic.index)
                .map(|(_, account)| account.clone());
            if !scan_all && event_account.is_none() {
                continue;
            }
            let Some(arg) = extrinsic.remark_arg() else {
                continue;
            };
            let candidate = Candidate {
                arg: arg.clone(),
                sender: event_account.flatten().or_else(|| extrinsic.signer.clone()),
                extrinsic_index: Some(extrinsic.index),
            };
            self.ingest(candidate, notification, observed_at).await;
        }
    }

    fn accepts_sender(&self, sender: Option<&str>) -> bool {
        match (&self.filter_account, sender) {
            (None, _) => true,
            (Some(filter), Some(sender)) => filter == sender,
            (Some(_), None) => false,
        }
    }

    async fn ingest(
        &self,
        candidate: Candidate,
        notification: &BlockNotification,
        observed_at: DateTime<Utc>,
    ) {
        if !self.accepts_sender(candidate.sender.as_deref()) {
            return;
        }

        let Some(text) = normalize(&candidate.arg) else {
            REMARKS_UNDECODABLE.inc();
            debug!(
                block_number = notification.number,
                extrinsic_index = ?candidate.extrinsic_index,
                shape = shape_name(&candidate.arg),
                "Skipping undecodable remark"
            );
            return;
        };
        REMARKS_DECODED.inc();

        let remark = NormalizedRemark {
            text,
            sender_account: candidate.sender.unwrap_or_default(),
            block_hash: notification.hash,
            block_number: notification.number,
            extrinsic_index: candidate.extrinsic_index,
        };

        let payload = match parse_detailed(&remark.text) {
            Ok(payload) => payload,
            Err(EnvelopeError::Mismatch) => return,
            Err(EnvelopeError::Invalid(reason)) => {
                PAYLOADS_REJECTED.inc();
                debug!(block_number = remark.block_number, %reason, "Rejected emergency envelope");
                return;
            }
        };
        let observed_ms = u64::try_from(observed_at.timestamp_millis()).unwrap_or(0);
        let payload = payload
            .with_reporter_fallback(&remark.sender_account)
            .with_observed_time(observed_ms);

        let key = remark.dedup_key(&payload.emergency_id);
        if !self.dedup.should_process(&key) {
            DUPLICATES_SKIPPED.with_label_values(&["memory"]).inc();
            debug!(%key, "Duplicate remark skipped");
            return;
        }

        let record = EmergencyRecord {
            payload,
            blockchain_ref: remark.blockchain_ref(),
            sender_account: remark.sender_account,
        };
        if !self.persist(&record, remark.block_number).await {
            self.dedup.forget(&key);
        }
    }

    /// Write a record. Returns `false` if the write failed and may be
    /// retried on redelivery.
    async fn persist(&self, record: &EmergencyRecord, block_number: u64) -> bool {
        if let (true, Some(blockchain_ref)) = (self.precheck_store, &record.blockchain_ref) {
            match self.store.find_by_blockchain_ref(blockchain_ref).await {
                Ok(Some(_)) => {
                    DUPLICATES_SKIPPED.with_label_values(&["store"]).inc();
                    debug!(%blockchain_ref, "Emergency already stored");
                    return true;
                }
                Ok(None) => {}
                // The upsert is idempotent, so a failed pre-check is not fatal.
                Err(e) => self.report(e.into(), Some(block_number)),
            }
        }

        if !self.is_active() {
            debug!(emergency_id = %record.payload.emergency_id, "Session stopped, write dropped");
            return true;
        }

        match self.store.upsert_emergency(record).await {
            Ok(()) => {
                EMERGENCIES_PERSISTED.inc();
                info!(
                    emergency_id = %record.payload.emergency_id,
                    severity = %record.payload.severity,
                    sender = %record.sender_account,
                    block_number,
                    "Emergency persisted"
                );
                if self.is_active() {
                    self.observer.on_emergency_received(&record.payload);
                }
                true
            }
            Err(e) => {
                self.report(e.into(), Some(block_number));
                false
            }
        }
    }

    fn report(&self, error: IngestionError, block_number: Option<u64>) {
        let error = classified(error, block_number);
        INGESTION_ERRORS.with_label_values(&[error.class.as_str()]).inc();

        match error.class {
            ErrorClass::Ignorable => debug!(
                block_number = ?error.block_number,
                "Ignoring transport noise: {}",
                error.error
            ),
            ErrorClass::Transient | ErrorClass::Fatal => {
                warn!(class = %error.class, block_number = ?error.block_number, "{}", error.error);
                if self.is_active() {
                    self.observer.on_error(&error);
                }
            }
        }
    }
}
