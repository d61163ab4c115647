// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_tracing, MockDocumentStore, MockLedger};
use custody_kernel::hash::digest;
use custody_kernel::types::Block;
use custody_node::binder::{SubmissionArgs, EVIDENCE_DIGEST_FIELD, INTEGRITY_HASH_FIELD};
use custody_node::config::NodeConfig;
use custody_node::ledger::StartOffset;
use custody_node::persistence::{ChecksumStore, MemoryChecksumStore};
use custody_node::tracker::TrackerState;
use custody_node::CustodyService;
use serde_json::{json, Value};

fn config() -> NodeConfig {
    NodeConfig {
        floor_block: 6,
        fetch_batch_size: 4,
        fetch_timeout: Duration::from_secs(1),
        init_wait: Duration::from_millis(50),
        reconcile_interval: Some(Duration::from_millis(10)),
        subscribe_from: StartOffset::Block(20),
        ..NodeConfig::default()
    }
}

fn args() -> SubmissionArgs {
    match json!({ "ID": "SP01", "TenSanPham": "Coffee" }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_service_binds_submissions_and_reconciles() {
    init_tracing();
    let ledger = Arc::new(MockLedger::with_height(20));
    let documents = Arc::new(MockDocumentStore::with_bundle("form-1", &["aa", "bb"]));
    let checksums = Arc::new(MemoryChecksumStore::default());
    let service = CustodyService::new(config(), ledger.clone(), documents, checksums.clone());

    service.start().await.unwrap();
    assert_eq!(service.tracker().state().await, TrackerState::Subscribed);
    assert_eq!(*ledger.subscriptions.lock().unwrap(), vec![StartOffset::Block(20)]);
    assert_eq!(checksums.load().await.unwrap().unwrap().last_verified_block, 20);

    assert!(ledger.publish(Block::new(20, vec![0xcc])).await);
    service
        .tracker()
        .wait_for_block_hash(Duration::from_secs(1))
        .await
        .unwrap();

    let receipt = service
        .binder()
        .submit_bound("CreateSanPham", args(), "form-1")
        .await
        .unwrap();
    assert_eq!(receipt.binding.block_hash, "cc");
    {
        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let sent: Value = serde_json::from_slice(&submitted[0].1).unwrap();
        assert_eq!(sent[EVIDENCE_DIGEST_FIELD], Value::String(digest(b"aabb")));
        assert_eq!(sent[INTEGRITY_HASH_FIELD], Value::String(receipt.binding.integrity_hash.clone()));
    }

    // Periodic job follows chain growth.
    ledger.grow_to(30);
    let mut verified = 0;
    for _ in 0..200 {
        verified = checksums.load().await.unwrap().unwrap().last_verified_block;
        if verified == 30 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(verified, 30);

    service.shutdown().await;
    assert_eq!(service.tracker().state().await, TrackerState::Stopped);
}

#[tokio::test]
async fn test_service_without_subscription_binds_on_chain_head() {
    let ledger = Arc::new(MockLedger::with_height(12));
    ledger.refuse_subscriptions(true);
    let service = CustodyService::new(
        NodeConfig {
            reconcile_interval: None,
            ..config()
        },
        ledger.clone(),
        Arc::new(MockDocumentStore::default()),
        Arc::new(MemoryChecksumStore::default()),
    );

    service.start().await.unwrap();
    assert_eq!(service.tracker().state().await, TrackerState::Uninitialized);

    let bound = service.binder().bind_integrity(args(), "form-none").await.unwrap();
    assert_eq!(bound.binding.block_hash, hex::encode(ledger.blocks(11..12)[0].data_hash.clone()));

    service.shutdown().await;
}
