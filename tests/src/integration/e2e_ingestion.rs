//! Remark → emergency scenarios.
//!
//! A block carrying an envelope ends in exactly one stored record and one
//! `on_emergency_received`; anything else leaves the store untouched.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use remark_ingestion::{
        BlockBody, ChannelObserver, EmergencyType, ExtrinsicScanMode, IngestionConfig,
        IngestionNotice, MockChainNode, RawEvent, RawExtrinsic, RemarkArg,
        RemarkIngestionApi, RemarkIngestionService, Severity, StaticConnector, TransportConfig,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use summit_telemetry::{
        encode_metrics, register_metrics, DUPLICATES_SKIPPED, EMERGENCIES_PERSISTED,
        REMARKS_DECODED,
    };

    const WAIT: Duration = Duration::from_secs(5);

    async fn listening(
        node: &Arc<MockChainNode>,
        store: Arc<TestStore>,
        filter: Option<&str>,
    ) -> (
        RemarkIngestionService,
        tokio::sync::mpsc::UnboundedReceiver<IngestionNotice>,
    ) {
        let svc = service(node, store);
        let (observer, notices) = ChannelObserver::new();
        svc.start(
            TransportConfig::new(ENDPOINT),
            filter.map(str::to_string),
            Arc::new(observer),
        )
        .await
        .unwrap();
        (svc, notices)
    }

    #[tokio::test]
    async fn test_hex_envelope_becomes_one_emergency() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (svc, mut notices) = listening(&node, store.clone(), None).await;
        let persisted = EMERGENCIES_PERSISTED.get();
        let decoded = REMARKS_DECODED.get();

        let header = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        // Counters are process-wide; other tests may add to them.
        assert!(EMERGENCIES_PERSISTED.get() >= persisted + 1.0);
        assert!(REMARKS_DECODED.get() >= decoded + 1.0);

        let found = emergencies(&seen);
        assert_eq!(found.len(), 1);
        let payload = &found[0];
        assert_eq!(payload.emergency_id, "e1");
        assert_eq!(payload.severity, Severity::High);
        assert_eq!(payload.emergency_type, EmergencyType::Fall);
        assert_eq!(payload.location.latitude, -33.45);
        assert_eq!(payload.location.longitude, -70.66);
        assert_eq!(payload.reporter_account, SENDER);

        assert_eq!(store.upserts(), 1);
        let record = store.get("e1").unwrap();
        let chain_ref = record.blockchain_ref.unwrap();
        assert_eq!(chain_ref.block_number, header.number);
        assert_eq!(chain_ref.extrinsic_index, 1);
        assert_eq!(svc.get_history().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_text_remark_is_history_only() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (svc, mut notices) = listening(&node, store.clone(), None).await;

        let header = node.push_block(
            vec![remark_event(1, RemarkArg::Text("hello world".to_string()))],
            BlockBody::default(),
        );
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert!(emergencies(&seen).is_empty());
        assert!(seen
            .iter()
            .any(|n| matches!(n, IngestionNotice::EventReceived(_))));
        assert!(!seen.iter().any(|n| matches!(n, IngestionNotice::Error(_))));
        assert_eq!(store.upserts(), 0);
        assert_eq!(svc.get_history().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_envelope_rejected_quietly() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (_svc, mut notices) = listening(&node, store.clone(), None).await;

        // latitude out of range
        let bad = "EMERGENCY:id=e9;severity=low;lat=123;lon=0";
        let header = node.push_block(vec![remark_event(0, hex_text(bad))], BlockBody::default());
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert!(emergencies(&seen).is_empty());
        assert!(!seen.iter().any(|n| matches!(n, IngestionNotice::Error(_))));
        assert_eq!(store.upserts(), 0);
    }

    #[tokio::test]
    async fn test_sender_filter_skips_other_accounts() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (svc, mut notices) = listening(&node, store.clone(), Some("5Other")).await;

        let header = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert!(emergencies(&seen).is_empty());
        assert_eq!(store.upserts(), 0);
        assert!(svc.get_history().is_empty());
    }

    #[tokio::test]
    async fn test_remark_resolved_from_block_body() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (_svc, mut notices) = listening(&node, store.clone(), None).await;

        let body = BlockBody {
            extrinsics: vec![RawExtrinsic::remark(
                2,
                SENDER,
                RemarkArg::Bytes(ENVELOPE.as_bytes().to_vec()),
            )],
        };
        let header = node.push_block(vec![RawEvent::remarked(2, SENDER, None)], body);
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert_eq!(emergencies(&seen).len(), 1);
        assert_eq!(node.body_calls(), 1);
        assert_eq!(store.upserts(), 1);
    }

    #[tokio::test]
    async fn test_same_remark_seen_twice_persisted_once() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let config = IngestionConfig {
            extrinsic_scan: ExtrinsicScanMode::Always,
            ..IngestionConfig::for_testing()
        };
        let svc = RemarkIngestionService::new(
            Arc::new(StaticConnector::new().with_endpoint(ENDPOINT, node.clone())),
            store.clone(),
            config,
        );
        let (observer, mut notices) = ChannelObserver::new();
        svc.start(TransportConfig::new(ENDPOINT), None, Arc::new(observer))
            .await
            .unwrap();
        let skipped = DUPLICATES_SKIPPED.with_label_values(&["memory"]).get();

        // The event carries the remark inline and the body repeats it.
        let body = BlockBody {
            extrinsics: vec![RawExtrinsic::remark(1, SENDER, hex_text(ENVELOPE))],
        };
        let header = node.push_block(vec![remark_event(1, hex_text(ENVELOPE))], body);
        let seen = wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        assert_eq!(emergencies(&seen).len(), 1);
        assert_eq!(store.upserts(), 1);
        assert_eq!(store.len(), 1);
        assert!(DUPLICATES_SKIPPED.with_label_values(&["memory"]).get() >= skipped + 1.0);
    }

    #[tokio::test]
    async fn test_emergency_moved_to_new_block_is_reindexed() {
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let store = TestStore::new();
        let (_svc, mut notices) = listening(&node, store.clone(), None).await;

        let first = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        wait_for(&mut notices, WAIT, |n| is_block(n, first.number)).await;
        let second = node.push_block(
            vec![remark_event(3, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        wait_for(&mut notices, WAIT, |n| is_block(n, second.number)).await;

        assert_eq!(store.upserts(), 2);
        assert_eq!(store.len(), 1);
        let chain_ref = store.get("e1").unwrap().blockchain_ref.unwrap();
        assert_eq!(chain_ref.block_number, second.number);
    }

    #[tokio::test]
    async fn test_ingestion_counters_exported() {
        // Registration fails harmlessly if another test got there first.
        let _ = register_metrics();
        let node = Arc::new(MockChainNode::new(ENDPOINT));
        let (_svc, mut notices) = listening(&node, TestStore::new(), None).await;

        let header = node.push_block(
            vec![remark_event(1, hex_text(ENVELOPE))],
            BlockBody::default(),
        );
        wait_for(&mut notices, WAIT, |n| is_block(n, header.number)).await;

        let text = encode_metrics().unwrap();
        assert!(text.contains("summit_ingest_blocks_processed_total"));
        assert!(text.contains("summit_ingest_emergencies_persisted_total"));
    }
}
