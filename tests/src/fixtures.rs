//! Shared fixtures for the integration suite.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};

use remark_ingestion::{
    BlockchainRef, EmergencyPayload, EmergencyRecord, EmergencyStore, InMemoryEmergencyStore,
    IngestionConfig, IngestionNotice, MockChainNode, RawEvent, RemarkArg, RemarkIngestionService,
    StaticConnector, StorageError,
};

/// Account used as remark sender throughout the suite.
pub const SENDER: &str = "5F3sa2TJAWMqDhXG6jhV4N8ko9SxwGy8TpaNS1repo5EYjQX";

/// Endpoint the mock node is registered under.
pub const ENDPOINT: &str = "ws://127.0.0.1:9944";

/// Envelope used by most scenarios.
pub const ENVELOPE: &str =
    "EMERGENCY:severity=high;lat=-33.45;lon=-70.66;id=e1;type=fall;desc=rope failure";

/// `0x`-hex rendering of `text`.
pub fn hex_text(text: &str) -> RemarkArg {
    RemarkArg::Text(format!("0x{}", hex::encode(text)))
}

/// `System.Remarked` event from [`SENDER`] carrying `arg` inline.
pub fn remark_event(extrinsic_index: u32, arg: RemarkArg) -> RawEvent {
    RawEvent::remarked(extrinsic_index, SENDER, Some(arg))
}

/// Store counting calls, optionally holding pre-checks at a gate.
pub struct TestStore {
    inner: InMemoryEmergencyStore,
    upserts: AtomicU32,
    lookups: AtomicU32,
    gate: watch::Receiver<bool>,
    gate_tx: watch::Sender<bool>,
    entered: Notify,
}

impl TestStore {
    /// Store with an open gate.
    pub fn new() -> Arc<Self> {
        Self::with_gate(true)
    }

    /// Store whose pre-check lookups block until [`open_gate`](Self::open_gate).
    pub fn gated() -> Arc<Self> {
        Self::with_gate(false)
    }

    fn with_gate(open: bool) -> Arc<Self> {
        let (gate_tx, gate) = watch::channel(open);
        Arc::new(Self {
            inner: InMemoryEmergencyStore::new(),
            upserts: AtomicU32::new(0),
            lookups: AtomicU32::new(0),
            gate,
            gate_tx,
            entered: Notify::new(),
        })
    }

    /// Release blocked lookups.
    pub fn open_gate(&self) {
        let _ = self.gate_tx.send(true);
    }

    /// Wait until a lookup has reached the gate.
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Upsert calls so far.
    pub fn upserts(&self) -> u32 {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Stored records.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Stored record by emergency id.
    pub fn get(&self, emergency_id: &str) -> Option<EmergencyRecord> {
        self.inner.get(emergency_id)
    }
}

#[async_trait]
impl EmergencyStore for TestStore {
    async fn upsert_emergency(&self, record: &EmergencyRecord) -> Result<(), StorageError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_emergency(record).await
    }

    async fn find_by_blockchain_ref(
        &self,
        blockchain_ref: &BlockchainRef,
    ) -> Result<Option<EmergencyRecord>, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let mut gate = self.gate.clone();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        self.inner.find_by_blockchain_ref(blockchain_ref).await
    }
}

/// Service wired to `node` under [`ENDPOINT`] and `store`.
pub fn service(node: &Arc<MockChainNode>, store: Arc<TestStore>) -> RemarkIngestionService {
    RemarkIngestionService::new(
        Arc::new(StaticConnector::new().with_endpoint(ENDPOINT, node.clone())),
        store,
        IngestionConfig::for_testing(),
    )
}

/// Receive notices until one matches `pred`, failing after `within`.
pub async fn wait_for<F>(
    rx: &mut mpsc::UnboundedReceiver<IngestionNotice>,
    within: Duration,
    mut pred: F,
) -> Vec<IngestionNotice>
where
    F: FnMut(&IngestionNotice) -> bool,
{
    let mut seen = Vec::new();
    let result = tokio::time::timeout(within, async {
        while let Some(notice) = rx.recv().await {
            let done = pred(&notice);
            seen.push(notice);
            if done {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for notice; saw {:?}", seen);
    seen
}

/// Everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<IngestionNotice>) -> Vec<IngestionNotice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}

/// Emergencies among `notices`.
pub fn emergencies(notices: &[IngestionNotice]) -> Vec<EmergencyPayload> {
    notices
        .iter()
        .filter_map(|n| match n {
            IngestionNotice::EmergencyReceived(p) => Some(p.clone()),
            _ => None,
        })
        .collect()
}

/// Whether `notice` reports block `number` processed.
pub fn is_block(notice: &IngestionNotice, number: u64) -> bool {
    matches!(
        notice,
        IngestionNotice::BlockProcessed { block_number, .. } if *block_number == number
    )
}
