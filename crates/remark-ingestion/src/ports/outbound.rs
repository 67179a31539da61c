//! # Outbound Ports
//!
//! Traits for external dependencies: the chain node, the transport built
//! on top of it, and the emergency store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

use crate::adapters::{map_backend_message, map_rpc_error};
use crate::config::TransportConfig;
use crate::domain::{
    BackendKind, BlockBody, BlockHash, BlockHeader, BlockNotification, BlockchainRef,
    EmergencyRecord, RawEvent, StorageError, TransportError,
};

/// Stream of new-head headers.
pub type HeaderStream = Pin<Box<dyn Stream<Item = Result<BlockHeader, TransportError>> + Send>>;

/// RPC contract of a chain node - outbound port.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Open a new-head subscription.
    async fn subscribe_new_heads(&self) -> Result<HeaderStream, TransportError>;

    /// Events emitted in a block.
    async fn events_at(&self, block_hash: BlockHash) -> Result<Vec<RawEvent>, TransportError>;

    /// Hash of the block at `number`.
    async fn block_hash(&self, number: u64) -> Result<BlockHash, TransportError>;

    /// Extrinsics of a block.
    async fn block_body(&self, block_hash: BlockHash) -> Result<BlockBody, TransportError>;

    /// Number of the best block.
    async fn latest_block_number(&self) -> Result<u64, TransportError>;

    /// Endpoint this client talks to (for logging).
    fn endpoint(&self) -> &str;
}

/// Resolves a [`ChainClient`] for a transport configuration - outbound port.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Produce a client for `config.endpoint`.
    async fn connect(
        &self,
        config: &TransportConfig,
    ) -> Result<Arc<dyn ChainClient>, TransportError>;
}

/// Message pushed from a transport to the session dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportMessage {
    /// A block and its events.
    Block(BlockNotification),
    /// A failure the transport survived.
    Fault {
        /// What went wrong.
        error: TransportError,
        /// Block being fetched, if any.
        block_number: Option<u64>,
    },
}

/// Sending half handed to [`ChainTransport::subscribe`].
pub type NotificationSink = mpsc::Sender<TransportMessage>;

/// Live subscription. Cancelling is idempotent; dropping cancels.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Wrap the task feeding the sink.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Mutex::new(Some(task)),
        }
    }

    /// Stop the feed. Further calls do nothing.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.task.lock().is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Block feed over a chain client - outbound port.
///
/// Streaming and polling backends implement this identically from the
/// pipeline's point of view.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Start feeding block notifications into `sink`.
    async fn subscribe(&self, sink: NotificationSink) -> Result<SubscriptionHandle, TransportError>;

    /// Events emitted in a block.
    async fn fetch_events_at(&self, block_hash: BlockHash) -> Result<Vec<RawEvent>, TransportError>;

    /// Hash of the block at `number`.
    async fn fetch_block_hash(&self, number: u64) -> Result<BlockHash, TransportError>;

    /// Extrinsics of a block.
    async fn fetch_block_body(&self, block_hash: BlockHash) -> Result<BlockBody, TransportError>;
}

/// Emergency persistence - outbound port.
#[async_trait]
pub trait EmergencyStore: Send + Sync {
    /// Insert or replace by emergency id.
    async fn upsert_emergency(&self, record: &EmergencyRecord) -> Result<(), StorageError>;

    /// Record persisted for a chain location, if any.
    async fn find_by_blockchain_ref(
        &self,
        blockchain_ref: &BlockchainRef,
    ) -> Result<Option<EmergencyRecord>, StorageError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

#[derive(Clone, Debug)]
struct MockBlock {
    header: BlockHeader,
    events: Vec<RawEvent>,
    body: BlockBody,
}

#[derive(Default)]
struct MockState {
    blocks: BTreeMap<u64, MockBlock>,
    subscribers: Vec<mpsc::UnboundedSender<Result<BlockHeader, TransportError>>>,
    failing_subscriptions: u32,
    failing_events: VecDeque<(i64, String)>,
    offline: bool,
}

/// Scriptable in-process chain node.
///
/// Starts at a genesis block `#0`. Every [`push_block`](Self::push_block)
/// appends a block and notifies open head subscriptions.
pub struct MockChainNode {
    endpoint: String,
    state: Mutex<MockState>,
    subscribe_calls: AtomicU32,
    body_calls: AtomicU32,
}

impl Default for MockChainNode {
    fn default() -> Self {
        Self::new("mock://node-1")
    }
}

impl MockChainNode {
    /// Create a node holding only genesis.
    pub fn new(endpoint: &str) -> Self {
        let mut state = MockState::default();
        state.blocks.insert(
            0,
            MockBlock {
                header: Self::header(0),
                events: Vec::new(),
                body: BlockBody::default(),
            },
        );
        Self {
            endpoint: endpoint.to_string(),
            state: Mutex::new(state),
            subscribe_calls: AtomicU32::new(0),
            body_calls: AtomicU32::new(0),
        }
    }

    /// Deterministic hash of block `number`.
    pub fn hash_for(number: u64) -> BlockHash {
        let mut bytes = [0xabu8; 32];
        bytes[24..].copy_from_slice(&number.to_be_bytes());
        BlockHash::new(bytes)
    }

    fn header(number: u64) -> BlockHeader {
        BlockHeader {
            number,
            hash: Self::hash_for(number),
            parent_hash: Self::hash_for(number.saturating_sub(1)),
        }
    }

    /// Append a block and notify head subscribers.
    pub fn push_block(&self, events: Vec<RawEvent>, body: BlockBody) -> BlockHeader {
        let mut state = self.state.lock();
        let number = state.blocks.keys().next_back().map_or(0, |n| n + 1);
        let header = Self::header(number);
        state.blocks.insert(
            number,
            MockBlock {
                header: header.clone(),
                events,
                body,
            },
        );
        state
            .subscribers
            .retain(|tx| tx.send(Ok(header.clone())).is_ok());
        header
    }

    /// Reject the next `n` subscription attempts.
    pub fn fail_next_subscriptions(&self, n: u32) {
        self.state.lock().failing_subscriptions = n;
    }

    /// Make every call fail with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fail the next event queries with a JSON-RPC error object.
    pub fn fail_next_events(&self, code: i64, message: &str) {
        self.state
            .lock()
            .failing_events
            .push_back((code, message.to_string()));
    }

    /// Push a client-library failure, reported as free text, into open
    /// head streams.
    pub fn inject_backend_failure(&self, message: &str) {
        self.inject_stream_error(map_backend_message(message));
    }

    /// Push an error into open head streams.
    pub fn inject_stream_error(&self, error: TransportError) {
        self.state
            .lock()
            .subscribers
            .retain(|tx| tx.send(Err(error.clone())).is_ok());
    }

    /// End all open head streams.
    pub fn close_subscriptions(&self) {
        self.state.lock().subscribers.clear();
    }

    /// Subscription attempts so far, failed ones included.
    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Block body requests so far.
    pub fn body_calls(&self) -> u32 {
        self.body_calls.load(Ordering::SeqCst)
    }

    /// Open head subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn check_online(&self) -> Result<(), TransportError> {
        if self.state.lock().offline {
            Err(map_backend_message(&format!("{} is offline", self.endpoint)))
        } else {
            Ok(())
        }
    }

    fn block_by_hash(&self, block_hash: BlockHash) -> Result<MockBlock, TransportError> {
        self.check_online()?;
        self.state
            .lock()
            .blocks
            .values()
            .find(|b| b.header.hash == block_hash)
            .cloned()
            .ok_or_else(|| TransportError::BlockNotFound(block_hash.to_hex()))
    }
}

#[async_trait]
impl ChainClient for MockChainNode {
    async fn subscribe_new_heads(&self) -> Result<HeaderStream, TransportError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut state = self.state.lock();
        if state.failing_subscriptions > 0 {
            state.failing_subscriptions -= 1;
            return Err(TransportError::SubscriptionRejected("mock rejection".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn events_at(&self, block_hash: BlockHash) -> Result<Vec<RawEvent>, TransportError> {
        let block = self.block_by_hash(block_hash)?;
        if let Some((code, message)) = self.state.lock().failing_events.pop_front() {
            return Err(map_rpc_error(code, &message));
        }
        Ok(block.events)
    }

    async fn block_hash(&self, number: u64) -> Result<BlockHash, TransportError> {
        self.check_online()?;
        self.state
            .lock()
            .blocks
            .get(&number)
            .map(|b| b.header.hash)
            .ok_or_else(|| TransportError::BlockNotFound(format!("#{}", number)))
    }

    async fn block_body(&self, block_hash: BlockHash) -> Result<BlockBody, TransportError> {
        self.body_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.block_by_hash(block_hash)?.body)
    }

    async fn latest_block_number(&self) -> Result<u64, TransportError> {
        self.check_online()?;
        Ok(self
            .state
            .lock()
            .blocks
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
