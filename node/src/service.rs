// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Custody Service
//!
//! One running node: the block tracker, the write path (evidence
//! aggregator and integrity binder), the audit path (chain recomputer) and
//! the reconciliation job, all wired from a [`NodeConfig`].

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::binder::IntegrityBinder;
use crate::config::NodeConfig;
use crate::errors::CustodyResult;
use crate::evidence::{DocumentStore, EvidenceDigestAggregator};
use crate::ledger::LedgerClient;
use crate::network::{CouchDocumentStore, HttpLedgerGateway};
use crate::persistence::{ChecksumStore, FileChecksumStore};
use crate::recompute::ChainRecomputer;
use crate::reconcile::ReconciliationJob;
use crate::tracker::LedgerBlockTracker;

pub struct CustodyService {
    config: NodeConfig,
    ledger: Arc<dyn LedgerClient>,
    tracker: Arc<LedgerBlockTracker>,
    binder: IntegrityBinder,
    recomputer: ChainRecomputer,
    reconciler: Arc<ReconciliationJob>,
    cancel: CancellationToken,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl CustodyService {
    /// HTTP gateway, CouchDB evidence store and on-disk checksum file.
    pub fn from_config(config: NodeConfig) -> CustodyResult<Self> {
        let ledger = Arc::new(HttpLedgerGateway::new(
            &config.gateway_url,
            &config.channel,
            &config.chaincode,
            config.fetch_timeout,
        )?);
        let documents = Arc::new(CouchDocumentStore::new(
            &config.document_store_url,
            &config.document_db,
            config.fetch_timeout,
        ));
        let checksums = Arc::new(FileChecksumStore::new(&config.checksum_path));
        Ok(Self::new(config, ledger, documents, checksums))
    }

    pub fn new(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        documents: Arc<dyn DocumentStore>,
        checksums: Arc<dyn ChecksumStore>,
    ) -> Self {
        let tracker = Arc::new(LedgerBlockTracker::new(config.channel.clone()));
        let aggregator = EvidenceDigestAggregator::new(documents, config.fetch_timeout);
        let binder = IntegrityBinder::new(aggregator, tracker.clone(), ledger.clone(), config.init_wait);
        let recomputer = ChainRecomputer::new(ledger.clone(), config.fetch_timeout, config.fetch_batch_size);
        let reconciler = Arc::new(ReconciliationJob::new(recomputer.clone(), checksums, config.floor_block));

        Self {
            config,
            ledger,
            tracker,
            binder,
            recomputer,
            reconciler,
            cancel: CancellationToken::new(),
            periodic: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<LedgerBlockTracker> {
        &self.tracker
    }

    /// Write path: bind and submit state-changing transactions.
    pub fn binder(&self) -> &IntegrityBinder {
        &self.binder
    }

    pub fn recomputer(&self) -> &ChainRecomputer {
        &self.recomputer
    }

    pub fn reconciler(&self) -> &Arc<ReconciliationJob> {
        &self.reconciler
    }

    /// Subscribe the tracker, reconcile once and spawn the periodic job.
    ///
    /// Only an unreadable checksum state is fatal. A failed subscription
    /// leaves binding on the chain-head fallback; a failed first
    /// reconciliation is retried by the periodic job.
    pub async fn start(&self) -> CustodyResult<()> {
        if let Err(e) = self
            .tracker
            .start(self.ledger.clone(), self.config.subscribe_from)
            .await
        {
            tracing::error!("Block subscription failed: {}", e);
        }

        match self.reconciler.load_state().await? {
            Some(state) => tracing::info!(
                "Found checksum state at {:?}, verified through block {}",
                self.config.checksum_path,
                state.last_verified_block
            ),
            None => tracing::info!(
                "No checksum state at {:?}. Starting from floor block {}",
                self.config.checksum_path,
                self.config.floor_block
            ),
        }

        match self.reconciler.run_once().await {
            Ok(report) => tracing::info!(
                "Startup reconciliation: consistent={}, through block {}",
                report.consistent,
                report.new_checksum.last_verified_block
            ),
            Err(e) => tracing::error!("Startup reconciliation failed: {}", e),
        }

        if let Some(interval) = self.config.reconcile_interval {
            let job = self.reconciler.clone();
            let cancel = self.cancel.clone();
            let handle = tokio::spawn(async move { job.run_periodic(interval, cancel).await });
            *self.periodic.lock().await = Some(handle);
        }

        match self.binder.resolve_block_hash().await {
            Ok(hash) => tracing::info!("Integrity binding ready at block hash {}", hex::encode(&hash[..hash.len().min(8)])),
            Err(e) => tracing::warn!("Integrity binding not ready yet: {}", e),
        }
        Ok(())
    }

    /// Stop the periodic job and the tracker. No callbacks run afterwards.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.periodic.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!("Periodic reconciliation ended abnormally: {}", e);
            }
        }
        self.tracker.stop().await;
    }
}
