// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checksum Reconciliation
//!
//! Recomputes the chain fold from scratch and compares it with the
//! persisted audit baseline. On mismatch the recomputed value wins: it is
//! persisted and the divergence is reported on the `custody::audit` target.
//! Ledger data is never touched; only the baseline is resynchronised.
//!
//! Runs are serialised by an in-process lock, so two reconciliations (or a
//! reconciliation and a catch-up) never write the checksum file at once.

use std::sync::Arc;
use std::time::Duration;

use custody_kernel::chain::ChainFold;
use custody_kernel::checksum::ChecksumState;
use custody_kernel::types::BlockNumber;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::errors::{CustodyError, CustodyResult};
use crate::persistence::ChecksumStore;
use crate::recompute::ChainRecomputer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub consistent: bool,
    pub new_checksum: ChecksumState,
    /// What was on disk before this run, if anything.
    pub previous: Option<ChecksumState>,
}

impl ReconcileReport {
    /// `InconsistencyDetected` for a run that had to resync.
    pub fn into_result(self) -> CustodyResult<ChecksumState> {
        if self.consistent {
            return Ok(self.new_checksum);
        }
        let persisted = self
            .previous
            .map(|p| p.rolling_hash)
            .unwrap_or_default();
        Err(CustodyError::InconsistencyDetected {
            persisted,
            recomputed: self.new_checksum.rolling_hash,
        })
    }
}

pub struct ReconciliationJob {
    recomputer: ChainRecomputer,
    store: Arc<dyn ChecksumStore>,
    floor: BlockNumber,
    writer: Mutex<()>,
}

impl ReconciliationJob {
    pub fn new(recomputer: ChainRecomputer, store: Arc<dyn ChecksumStore>, floor: BlockNumber) -> Self {
        Self {
            recomputer,
            store,
            floor,
            writer: Mutex::new(()),
        }
    }

    pub fn floor(&self) -> BlockNumber {
        self.floor
    }

    pub async fn load_state(&self) -> CustodyResult<Option<ChecksumState>> {
        self.store.load().await
    }

    /// Recompute `[floor, head)` and compare against the persisted checksum.
    pub async fn reconcile(&self, head: BlockNumber) -> CustodyResult<ReconcileReport> {
        let _guard = self.writer.lock().await;

        let previous = self.store.load().await?;
        let baseline = previous
            .clone()
            .unwrap_or_else(|| ChecksumState::genesis(self.floor));
        let recomputed = self.recomputer.recompute_chain_hash(head, self.floor).await?;
        metrics::increment_counter!("custody_reconcile_runs_total");

        if recomputed == baseline.rolling_hash {
            if previous.is_none() {
                self.store.save(&baseline).await?;
            }
            tracing::info!(
                "Checksum consistent over blocks {}..{}: {}",
                self.floor,
                head,
                recomputed
            );
            return Ok(ReconcileReport {
                consistent: true,
                new_checksum: baseline,
                previous,
            });
        }

        let new_checksum = ChecksumState {
            rolling_hash: recomputed,
            last_verified_block: head.max(self.floor),
        };
        self.store.save(&new_checksum).await?;

        metrics::increment_counter!("custody_reconcile_divergence_total");
        tracing::warn!(
            target: "custody::audit",
            "Checksum divergence over blocks {}..{}: persisted {} (through block {}), recomputed {}; baseline resynchronised",
            self.floor,
            head,
            baseline.rolling_hash,
            baseline.last_verified_block,
            new_checksum.rolling_hash
        );

        Ok(ReconcileReport {
            consistent: false,
            new_checksum,
            previous,
        })
    }

    /// Advance the persisted fold to `head` without rescanning from the floor.
    pub async fn catch_up(&self, head: BlockNumber) -> CustodyResult<ChecksumState> {
        let _guard = self.writer.lock().await;

        let state = self
            .store
            .load()
            .await?
            .unwrap_or_else(|| ChecksumState::genesis(self.floor));
        if head < state.last_verified_block {
            return Err(CustodyError::InvalidInput(format!(
                "cannot catch up to block {}: already verified through {}",
                head, state.last_verified_block
            )));
        }
        if head == state.last_verified_block {
            return Ok(state);
        }

        let fold = ChainFold::resume(self.floor, &state);
        let fold = self.recomputer.extend(fold, head).await?;
        let advanced = fold.to_state();
        self.store.save(&advanced).await?;

        tracing::info!(
            "Checksum advanced from block {} to {}: {}",
            state.last_verified_block,
            advanced.last_verified_block,
            advanced.rolling_hash
        );
        Ok(advanced)
    }

    /// Verify the persisted baseline over the range it claims, then extend
    /// it to the current chain height.
    pub async fn run_once(&self) -> CustodyResult<ReconcileReport> {
        let height = self.recomputer.ledger().chain_height().await?;
        let verified_through = self
            .store
            .load()
            .await?
            .map(|s| s.last_verified_block)
            .unwrap_or(self.floor)
            .min(height);

        let mut report = self.reconcile(verified_through).await?;
        report.new_checksum = self.catch_up(height.max(report.new_checksum.last_verified_block)).await?;
        Ok(report)
    }

    /// `run_once` every `interval` until `cancel` fires. Failures are logged
    /// and the next tick retries.
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.consistent => {
                            tracing::debug!("Reconciliation ok through block {}", report.new_checksum.last_verified_block);
                        }
                        Ok(report) => {
                            tracing::warn!("Reconciliation resynchronised baseline, now through block {}", report.new_checksum.last_verified_block);
                        }
                        Err(e) => tracing::error!("Reconciliation failed: {}", e),
                    }
                }
            }
        }
        tracing::info!("Periodic reconciliation stopped");
    }
}
