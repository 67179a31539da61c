//! Channel observer: forwards callbacks as messages.

use tokio::sync::mpsc;

use crate::algorithms::HealthAdvisory;
use crate::domain::{ChainEventRecord, ClassifiedError, EmergencyPayload};
use crate::ports::IngestionObserver;

/// One observer callback, as a value.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestionNotice {
    /// `on_event_received`.
    EventReceived(ChainEventRecord),
    /// `on_emergency_received`.
    EmergencyReceived(EmergencyPayload),
    /// `on_block_processed`.
    BlockProcessed {
        /// Block number.
        block_number: u64,
        /// Events in the block.
        event_count: usize,
    },
    /// `on_error`.
    Error(ClassifiedError),
    /// `on_health_advisory`.
    HealthAdvisory(HealthAdvisory),
}

/// Observer that sends every callback over an unbounded channel.
///
/// Notices are dropped once the receiver is gone.
#[derive(Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<IngestionNotice>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IngestionNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notice: IngestionNotice) {
        let _ = self.tx.send(notice);
    }
}

impl IngestionObserver for ChannelObserver {
    fn on_event_received(&self, record: &ChainEventRecord) {
        self.send(IngestionNotice::EventReceived(record.clone()));
    }

    fn on_emergency_received(&self, payload: &EmergencyPayload) {
        self.send(IngestionNotice::EmergencyReceived(payload.clone()));
    }

    fn on_block_processed(&self, block_number: u64, event_count: usize) {
        self.send(IngestionNotice::BlockProcessed {
            block_number,
            event_count,
        });
    }

    fn on_error(&self, error: &ClassifiedError) {
        self.send(IngestionNotice::Error(error.clone()));
    }

    fn on_health_advisory(&self, advisory: &HealthAdvisory) {
        self.send(IngestionNotice::HealthAdvisory(*advisory));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_become_notices() {
        let (observer, mut rx) = ChannelObserver::new();
        observer.on_block_processed(7, 2);
        assert_eq!(
            rx.try_recv().unwrap(),
            IngestionNotice::BlockProcessed {
                block_number: 7,
                event_count: 2
            }
        );
    }

    #[test]
    fn test_dropped_receiver_is_harmless() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_block_processed(1, 0);
    }
}
