//! Streaming backend: new-head subscription.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::retry_with_backoff;
use crate::config::RetryPolicy;
use crate::domain::{BackendKind, BlockBody, BlockHash, BlockNotification, RawEvent, TransportError};
use crate::ports::{
    ChainClient, ChainTransport, HeaderStream, NotificationSink, SubscriptionHandle,
    TransportMessage,
};

/// Transport fed by a new-head subscription.
pub struct StreamingTransport {
    client: Arc<dyn ChainClient>,
    retry: RetryPolicy,
}

impl StreamingTransport {
    /// Create a transport over `client`; `retry` governs resubscription
    /// after the head stream ends.
    pub fn new(client: Arc<dyn ChainClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

#[async_trait]
impl ChainTransport for StreamingTransport {
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    async fn subscribe(
        &self,
        sink: NotificationSink,
    ) -> Result<SubscriptionHandle, TransportError> {
        let heads = self.client.subscribe_new_heads().await?;
        let feed = HeadFeed {
            client: self.client.clone(),
            retry: self.retry.clone(),
            sink,
        };
        Ok(SubscriptionHandle::new(tokio::spawn(feed.run(heads))))
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

struct HeadFeed {
    client: Arc<dyn ChainClient>,
    retry: RetryPolicy,
    sink: NotificationSink,
}

impl HeadFeed {
    async fn run(self, mut heads: HeaderStream) {
        loop {
            while let Some(item) = heads.next().await {
                let message = match item {
                    Ok(header) => match self.client.events_at(header.hash).await {
                        Ok(events) => TransportMessage::Block(BlockNotification {
                            number: header.number,
                            hash: header.hash,
                            events,
                        }),
                        Err(error) => TransportMessage::Fault {
                            error,
                            block_number: Some(header.number),
                        },
                    },
                    Err(error) => TransportMessage::Fault {
                        error,
                        block_number: None,
                    },
                };
                if self.sink.send(message).await.is_err() {
                    debug!("Notification sink closed, ending head feed");
                    return;
                }
            }

            // Stream ended underneath us: reconnect noise, then resubscribe.
            let closed = TransportMessage::Fault {
                error: TransportError::ConnectionClosed("head stream ended".to_string()),
                block_number: None,
            };
            if self.sink.send(closed).await.is_err() {
                return;
            }

            let client = self.client.clone();
            match retry_with_backoff(&self.retry, |_| {
                let client = client.clone();
                async move { client.subscribe_new_heads().await }
            })
            .await
            {
                Ok(stream) => {
                    info!(endpoint = self.client.endpoint(), "Head subscription re-established");
                    heads = stream;
                }
                Err((attempts, error)) => {
                    warn!(attempts, %error, "Head subscription lost");
                    let _ = self
                        .sink
                        .send(TransportMessage::Fault {
                            error: TransportError::SubscriptionLost { attempts },
                            block_number: None,
                        })
                        .await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemarkArg;
    use crate::ports::MockChainNode;
    use tokio::sync::mpsc;

    fn transport(node: &Arc<MockChainNode>) -> StreamingTransport {
        StreamingTransport::new(node.clone(), RetryPolicy::default())
    }

    #[tokio::test]
    async fn test_headers_become_notifications() {
        let node = Arc::new(MockChainNode::default());
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = transport(&node).subscribe(tx).await.unwrap();

        let event = RawEvent::remarked(1, "5F3s", Some(RemarkArg::Text("hi".to_string())));
        let header = node.push_block(vec![event.clone()], BlockBody::default());

        match rx.recv().await.unwrap() {
            TransportMessage::Block(n) => {
                assert_eq!(n.number, header.number);
                assert_eq!(n.hash, header.hash);
                assert_eq!(n.events, vec![event]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_returned() {
        let node = Arc::new(MockChainNode::default());
        node.fail_next_subscriptions(1);
        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            transport(&node).subscribe(tx).await,
            Err(TransportError::SubscriptionRejected(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribes_after_stream_end() {
        let node = Arc::new(MockChainNode::default());
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = transport(&node).subscribe(tx).await.unwrap();

        node.fail_next_subscriptions(1);
        node.close_subscriptions();

        assert!(matches!(
            rx.recv().await.unwrap(),
            TransportMessage::Fault { error: TransportError::ConnectionClosed(_), .. }
        ));

        // One rejected attempt, then success after the backoff.
        while node.subscriber_count() == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert_eq!(node.subscribe_calls(), 3);

        node.push_block(vec![], BlockBody::default());
        assert!(matches!(rx.recv().await.unwrap(), TransportMessage::Block(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_subscription_reported() {
        let node = Arc::new(MockChainNode::default());
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = transport(&node).subscribe(tx).await.unwrap();

        node.fail_next_subscriptions(3);
        node.close_subscriptions();

        let _closed = rx.recv().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportMessage::Fault {
                error: TransportError::SubscriptionLost { attempts: 3 },
                block_number: None,
            }
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_feed() {
        let node = Arc::new(MockChainNode::default());
        let (tx, mut rx) = mpsc::channel(8);
        let handle = transport(&node).subscribe(tx).await.unwrap();

        handle.cancel();
        tokio::task::yield_now().await;
        node.push_block(vec![], BlockBody::default());
        assert!(rx.recv().await.is_none());
    }
}
