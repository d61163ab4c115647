// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use custody_kernel::types::{Block, BlockNumber, EvidenceDocument};
use custody_node::errors::{CustodyError, CustodyResult};
use custody_node::evidence::DocumentStore;
use custody_node::ledger::{BlockEvents, LedgerClient, StartOffset};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

/// Deterministic data hash for block `n`.
pub fn block_hash(n: u64) -> Vec<u8> {
    custody_kernel::hash::digest_bytes(format!("block-{}", n).as_bytes()).to_vec()
}

/// In-memory ledger: block `n` lives at index `n`.
#[derive(Default)]
pub struct MockLedger {
    blocks: Mutex<Vec<Block>>,
    tx_blocks: Mutex<HashMap<String, BlockNumber>>,
    failing_block: Mutex<Option<BlockNumber>>,
    fetch_delay: Mutex<Option<Duration>>,
    history: Mutex<Vec<u8>>,
    subscriber: Mutex<Option<mpsc::Sender<CustodyResult<Block>>>>,
    refuse_subscriptions: Mutex<bool>,
    pub subscriptions: Mutex<Vec<StartOffset>>,
    pub submitted: Mutex<Vec<(String, Vec<u8>)>>,
    pub block_fetches: AtomicUsize,
}

impl MockLedger {
    pub fn with_height(height: u64) -> Self {
        let ledger = Self::default();
        ledger.grow_to(height);
        ledger
    }

    pub fn grow_to(&self, height: u64) {
        let mut blocks = self.blocks.lock().unwrap();
        while (blocks.len() as u64) < height {
            let n = blocks.len() as u64;
            blocks.push(Block::new(n, block_hash(n)));
        }
    }

    pub fn blocks(&self, range: std::ops::Range<u64>) -> Vec<Block> {
        self.blocks.lock().unwrap()[range.start as usize..range.end as usize].to_vec()
    }

    /// Rewrite history: swap the data hash of block `n`.
    pub fn tamper(&self, n: u64, data_hash: Vec<u8>) {
        self.blocks.lock().unwrap()[n as usize].data_hash = data_hash;
    }

    pub fn commit_tx(&self, tx_id: &str, block: BlockNumber) {
        self.tx_blocks.lock().unwrap().insert(tx_id.to_string(), block);
    }

    pub fn fail_block(&self, n: BlockNumber) {
        *self.failing_block.lock().unwrap() = Some(n);
    }

    pub fn delay_fetches(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_history(&self, json: &str) {
        *self.history.lock().unwrap() = json.as_bytes().to_vec();
    }

    /// End the live subscription stream, as a dropped gateway connection would.
    pub fn end_subscription(&self) {
        self.subscriber.lock().unwrap().take();
    }

    pub fn refuse_subscriptions(&self, refuse: bool) {
        *self.refuse_subscriptions.lock().unwrap() = refuse;
    }

    /// Deliver a block event to the live subscription. False once the
    /// subscriber has gone away.
    pub async fn publish(&self, block: Block) -> bool {
        let sender = self.subscriber.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(Ok(block)).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit_transaction(&self, function: &str, args: &[u8]) -> CustodyResult<Vec<u8>> {
        self.submitted
            .lock()
            .unwrap()
            .push((function.to_string(), args.to_vec()));
        Ok(b"{\"ok\":true}".to_vec())
    }

    async fn evaluate_transaction(&self, _function: &str, _args: &[u8]) -> CustodyResult<Vec<u8>> {
        Ok(self.history.lock().unwrap().clone())
    }

    async fn subscribe_blocks(&self, start: StartOffset) -> CustodyResult<BlockEvents> {
        if *self.refuse_subscriptions.lock().unwrap() {
            return Err(CustodyError::lookup("ledger", "event service unavailable"));
        }
        self.subscriptions.lock().unwrap().push(start);
        let (tx, rx) = mpsc::channel(16);
        *self.subscriber.lock().unwrap() = Some(tx);
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn fetch_block_by_number(&self, number: BlockNumber) -> CustodyResult<Block> {
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.failing_block.lock().unwrap() == Some(number) {
            return Err(CustodyError::lookup("ledger", "peer unavailable"));
        }
        self.blocks
            .lock()
            .unwrap()
            .get(number as usize)
            .cloned()
            .ok_or_else(|| CustodyError::NotFound(format!("block {}", number)))
    }

    async fn fetch_block_containing_tx(&self, tx_id: &str) -> CustodyResult<Block> {
        let number = self
            .tx_blocks
            .lock()
            .unwrap()
            .get(tx_id)
            .copied()
            .ok_or_else(|| CustodyError::NotFound(format!("transaction {}", tx_id)))?;
        self.fetch_block_by_number(number).await
    }

    async fn chain_height(&self) -> CustodyResult<BlockNumber> {
        Ok(self.blocks.lock().unwrap().len() as u64)
    }
}

/// In-memory evidence store.
#[derive(Default)]
pub struct MockDocumentStore {
    bundles: Mutex<HashMap<String, Vec<EvidenceDocument>>>,
    unavailable: Mutex<bool>,
}

impl MockDocumentStore {
    pub fn with_bundle(bundle_id: &str, hashes: &[&str]) -> Self {
        let store = Self::default();
        store.insert(bundle_id, hashes);
        store
    }

    pub fn insert(&self, bundle_id: &str, hashes: &[&str]) {
        let docs = hashes
            .iter()
            .enumerate()
            .map(|(i, h)| EvidenceDocument::new(format!("images/descriptions/{}-{}.png", bundle_id, i), "image/png", *h))
            .collect();
        self.bundles.lock().unwrap().insert(bundle_id.to_string(), docs);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn list_documents(&self, bundle_id: &str) -> CustodyResult<Vec<EvidenceDocument>> {
        if *self.unavailable.lock().unwrap() {
            return Err(CustodyError::lookup("document store", "connection refused"));
        }
        Ok(self
            .bundles
            .lock()
            .unwrap()
            .get(bundle_id)
            .cloned()
            .unwrap_or_default())
    }
}
