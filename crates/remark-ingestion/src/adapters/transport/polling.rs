//! Polling backend: interval reads of the best block number.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::domain::{BackendKind, BlockBody, BlockHash, BlockNotification, RawEvent, TransportError};
use crate::ports::{
    ChainClient, ChainTransport, NotificationSink, SubscriptionHandle, TransportMessage,
};

/// Transport fed by polling the best block number.
pub struct PollingTransport {
    client: Arc<dyn ChainClient>,
    interval: Duration,
    max_catch_up: u64,
}

impl PollingTransport {
    /// Poll every `interval`, emitting at most `max_catch_up` blocks per tick.
    pub fn new(client: Arc<dyn ChainClient>, interval: Duration, max_catch_up: u64) -> Self {
        Self {
            client,
            interval,
            max_catch_up: max_catch_up.max(1),
        }
    }
}

#[async_trait]
impl ChainTransport for PollingTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Polling
    }

    async fn subscribe(
        &self,
        sink: NotificationSink,
    ) -> Result<SubscriptionHandle, TransportError> {
        // Baseline read doubles as the reachability check.
        let baseline = self.client.latest_block_number().await?;
        debug!(baseline, interval_secs = self.interval.as_secs(), "Polling from baseline");

        let poller = Poller {
            client: self.client.clone(),
            max_catch_up: self.max_catch_up,
            next: baseline + 1,
            sink,
        };
        Ok(SubscriptionHandle::new(tokio::spawn(poller.run(self.interval))))
    }

    async fn fetch_events_at(
        &self,
        block_hash: BlockHash,
    ) -> Result<Vec<RawEvent>, TransportError> {
        self.client.events_at(block_hash).await
    }

    async fn fetch_block_hash(&self, number: u64) -> Result<BlockHash, TransportError> {
        self.client.block_hash(number).await
    }

    async fn fetch_block_body(&self, block_hash: BlockHash) -> Result<BlockBody, TransportError> {
        self.client.block_body(block_hash).await
    }
}

struct Poller {
    client: Arc<dyn ChainClient>,
    max_catch_up: u64,
    next: u64,
    sink: NotificationSink,
}

impl Poller {
    async fn run(mut self, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.poll_once().await {
                debug!("Notification sink closed, ending poller");
                return;
            }
        }
    }

    /// One tick. Returns `false` once the sink is gone.
    async fn poll_once(&mut self) -> bool {
        let latest = match self.client.latest_block_number().await {
            Ok(n) => n,
            Err(error) => {
                return self
                    .emit(TransportMessage::Fault {
                        error,
                        block_number: None,
                    })
                    .await
            }
        };
        if latest < self.next {
            trace!(latest, "No new blocks");
            return true;
        }

        let last = latest.min(self.next + self.max_catch_up - 1);
        while self.next <= last {
            let number = self.next;
            match self.fetch(number).await {
                Ok(notification) => {
                    self.next += 1;
                    if !self.emit(TransportMessage::Block(notification)).await {
                        return false;
                    }
                }
                // Retried on the next tick.
                Err(error) => {
                    return self
                        .emit(TransportMessage::Fault {
                            error,
                            block_number: Some(number),
                        })
                        .await;
                }
            }
        }
        true
    }

    async fn fetch(&self, number: u64) -> Result<BlockNotification, TransportError> {
        let hash = self.client.block_hash(number).await?;
        let events = self.client.events_at(hash).await?;
        Ok(BlockNotification { number, hash, events })
    }

    async fn emit(&self, message: TransportMessage) -> bool {
        self.sink.send(message).await.is_ok()
    }
}
