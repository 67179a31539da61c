//! Transport establishment and recovery scenarios.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use remark_ingestion::{
        BackendKind, BlockBody, ChannelObserver, ErrorClass, IngestionError, IngestionNotice,
        MockChainNode, RemarkIngestionApi, SessionState, SetupError, TransportConfig,
        TransportError,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use summit_telemetry::TRANSPORT_FALLBACKS;

    const WAIT: Duration = Duration::from_secs(30);

    fn errors(notices: &[IngestionNotice]) -> Vec<&IngestionNotice> {
        notices
            .iter()
            .filter(|n| matches!(n, IngestionNotice::Error(_)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_polling_after_retries() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        node.fail_next_subscriptions(3);
        let store = TestStore::new();
        let svc = service(&node, store.clone());
        let (observer, mut notices) = ChannelObserver::new();
        let fallbacks = TRANSPORT_FALLBACKS.get();

        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();
        assert_eq!(node.subscribe_calls(), 3);
        assert!(TRANSPORT_FALLBACKS.get() >= fallbacks + 1.0);
        assert_eq!(svc.active_backend(), Some(BackendKind::Polling));
        assert_eq!(svc.state(), SessionState::Listening);

        let header = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert_eq!(emergencies(&seen).len(), 1);
        assert_eq!(store.upserts(), 1);
        assert!(errors(&seen).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_requested_directly() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();

        svc.start(TransportConfig::polling(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();
        assert_eq!(node.subscribe_calls(), 0);
        assert_eq!(svc.active_backend(), Some(BackendKind::Polling));

        let first = node.push_block(vec![], BlockBody::default());
        let second = node.push_block(vec![], BlockBody::default());
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, second.number)).await;
        assert!(seen.iter().any(|n| is_block(n, first.number)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_node_is_fatal() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        node.set_offline(true);
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();

        let err = svc
            .start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap_err();

        assert!(matches!(err, SetupError::Exhausted { attempts: 4, .. }));
        assert!(!svc.is_listening());
        assert_eq!(svc.state(), SessionState::Idle);
        let seen = drain(&mut notices);
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], IngestionNotice::Error(e) if e.class == ErrorClass::Fatal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_resubscribes_silently() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        node.close_subscriptions();
        while node.subscribe_calls() < 2 || node.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }

        let header = node.push_block(vec![], BlockBody::default());
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;
        assert!(errors(&seen).is_empty());
        assert!(svc.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_internal_fault_is_not_reported() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        node.inject_backend_failure(
            "TypeError: Cannot read properties of undefined (reading 'hash')",
        );
        node.inject_backend_failure("WebSocket is not connected");
        let header = node.push_block(vec![], BlockBody::default());
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert!(errors(&seen).is_empty());
        assert_eq!(node.subscribe_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_subscription_reported_as_transient() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        node.fail_next_subscriptions(3);
        node.close_subscriptions();
        let seen = wait_for(&mut notices, WAIT, |n| matches!(n, IngestionNotice::Error(_))).await;

        let Some(IngestionNotice::Error(error)) = seen.last() else {
            panic!("expected an error notice, saw {:?}", seen);
        };
        assert_eq!(error.class, ErrorClass::Transient);
        assert!(matches!(
            error.error,
            IngestionError::Transport(TransportError::SubscriptionLost { attempts: 3 })
        ));
        assert!(svc.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpc_failure_for_one_block_is_transient() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        node.fail_next_events(-32000, "State already discarded");
        let failed = node.push_block(vec![], BlockBody::default());
        let seen = wait_for(&mut notices, WAIT, |n| matches!(n, IngestionNotice::Error(_))).await;
        let Some(IngestionNotice::Error(error)) = seen.last() else {
            panic!("expected an error notice, saw {:?}", seen);
        };
        assert_eq!(error.class, ErrorClass::Transient);
        assert_eq!(error.block_number, Some(failed.number));
        assert!(matches!(
            error.error,
            IngestionError::Transport(TransportError::Rpc { code: -32000, .. })
        ));

        // The next block is processed normally.
        let next = node.push_block(vec![], BlockBody::default());
        wait_for(&mut notices, WAIT, |n| is_block(n, next.number)).await;
        assert!(svc.is_listening());
    }
}
