//! Start/stop behavior, write-after-stop and health advisories.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use remark_ingestion::{
        BlockBody, ChannelObserver, IngestionNotice, MockChainNode, RemarkArg,
        RemarkIngestionApi, SessionState, TransportConfig,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_stop_during_precheck_never_writes() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::gated();
        let svc = service(&node, store.clone());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        node.push_block(vec![remark_event(1, hex_text(ENVELOPE))], BlockBody::default());
        store.wait_entered().await;

        svc.stop().await;
        store.open_gate();
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert_eq!(store.upserts(), 0);
        assert_eq!(store.len(), 0);
        assert!(emergencies(&drain(&mut notices)).is_empty());
        assert_eq!(svc.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_no_callbacks_after_stop() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let svc = service(&node, store.clone());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        svc.stop().await;
        node.push_block(vec![remark_event(1, hex_text(ENVELOPE))], BlockBody::default());
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }

        assert!(drain(&mut notices).is_empty());
        assert_eq!(store.upserts(), 0);
        assert_eq!(node.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let svc = service(&node, store.clone());
        let config = TransportConfig::new(ENDPOINT);

        let (observer, _first) = ChannelObserver::new();
        svc.start(config.clone(), None, Arc::new(observer)).await.unwrap();
        svc.stop().await;

        let (observer, mut notices) = ChannelObserver::new();
        svc.start(config, None, Arc::new(observer)).await.unwrap();
        assert_eq!(svc.state(), SessionState::Listening);

        let header = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;
        assert_eq!(emergencies(&seen).len(), 1);
        assert_eq!(store.upserts(), 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded_newest_first() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        // history capacity under the testing config is 8
        let mut last = 0;
        for i in 0..12u32 {
            let remark = RemarkArg::Text(format!("note {}", i));
            last = node.push_block(vec![remark_event(i, remark)], BlockBody::default()).number;
        }
        wait_for(&mut notices, WAIT, |n| is_block(n, last)).await;

        let history = svc.get_history();
        assert_eq!(history.len(), 8);
        assert_eq!(history[0].block_number, Some(last));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_raises_advisory_and_keeps_listening() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let svc = service(&node, TestStore::new());
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();

        let seen = wait_for(&mut notices, Duration::from_secs(300), |n| {
            matches!(n, IngestionNotice::HealthAdvisory(_))
        })
        .await;
        let Some(IngestionNotice::HealthAdvisory(advisory)) = seen.last() else {
            panic!("expected an advisory, saw {:?}", seen);
        };
        assert!(advisory.silent_for > advisory.threshold);
        assert!(svc.is_listening());
        assert!(svc.is_degraded());

        let header = node.push_block(vec![], BlockBody::default());
        wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;
        assert!(!svc.is_degraded());
    }
}
