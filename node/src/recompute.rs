// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Chain Recomputation
//!
//! Rebuilds the rolling chain hash from ledger history alone.
//!
//! # Ordering
//! Blocks are fetched and folded strictly in ascending order. Annotating a
//! history walks the chain once, reading off the fold at each record's
//! block.
//!
//! # Failure
//! Any fetch failure or timeout aborts the recomputation. There is no
//! partial result and no cached fallback.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use custody_kernel::chain::ChainFold;
use custody_kernel::hash::empty_digest;
use custody_kernel::types::BlockNumber;
use futures::stream::{self, StreamExt, TryStreamExt};
use futures::pin_mut;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CustodyError, CustodyResult};
use crate::ledger::{ordered_blocks, LedgerClient};

/// Recomputed chain hash for the block containing one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAudit {
    pub tx_id: String,
    pub block_number: BlockNumber,
    pub chain_hash: String,
}

/// One entry of a key's ledger history, as returned by the history queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "TxId")]
    pub tx_id: String,
    #[serde(rename = "hashpbs", default, skip_serializing_if = "Option::is_none")]
    pub chain_hash: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Clone)]
pub struct ChainRecomputer {
    ledger: Arc<dyn LedgerClient>,
    fetch_timeout: Duration,
    batch_size: u64,
}

impl ChainRecomputer {
    pub fn new(ledger: Arc<dyn LedgerClient>, fetch_timeout: Duration, batch_size: u64) -> Self {
        Self {
            ledger,
            fetch_timeout,
            batch_size,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Fold blocks `[floor, target)`. An empty range is the empty digest.
    pub async fn recompute_chain_hash(&self, target: BlockNumber, floor: BlockNumber) -> CustodyResult<String> {
        if target <= floor {
            return Ok(empty_digest());
        }
        let fold = self.extend(ChainFold::new(floor), target).await?;
        Ok(fold.finish())
    }

    /// Continue `fold` up to (not including) `end`.
    pub async fn extend(&self, mut fold: ChainFold, end: BlockNumber) -> CustodyResult<ChainFold> {
        let start = fold.next_block();
        if end <= start {
            return Ok(fold);
        }

        tracing::info!("Recomputing chain hash over blocks {}..{}", start, end);
        let timer = Instant::now();

        let blocks = ordered_blocks(self.ledger.as_ref(), start..end, self.batch_size, self.fetch_timeout);
        pin_mut!(blocks);
        while let Some(block) = blocks.try_next().await? {
            fold.absorb(&block)?;
        }

        metrics::histogram!("custody_chain_recompute_duration_seconds", timer.elapsed().as_secs_f64());
        Ok(fold)
    }

    /// Locate the block containing `tx_id` and fold `[floor, block)`.
    pub async fn audit_transaction(&self, tx_id: &str, floor: BlockNumber) -> CustodyResult<TransactionAudit> {
        let block = self.ledger.fetch_block_containing_tx(tx_id).await?;
        let chain_hash = self.recompute_chain_hash(block.number, floor).await?;
        Ok(TransactionAudit {
            tx_id: tx_id.to_string(),
            block_number: block.number,
            chain_hash,
        })
    }

    /// Attach the recomputed chain hash to every record.
    ///
    /// The containing blocks are visited in ascending order by a single
    /// fold, so each ledger block is fetched once however many records
    /// there are. Records committed in the same block share one value.
    pub async fn annotate_history(&self, mut records: Vec<HistoryRecord>, floor: BlockNumber) -> CustodyResult<Vec<HistoryRecord>> {
        let concurrency = usize::try_from(self.batch_size.max(1)).unwrap_or(usize::MAX);
        let blocks: Vec<BlockNumber> = stream::iter(
            records
                .iter()
                .map(|r| self.ledger.fetch_block_containing_tx(&r.tx_id)),
        )
        .buffered(concurrency)
        .map_ok(|block| block.number)
        .try_collect()
        .await?;

        let numbers: BTreeSet<BlockNumber> = blocks.iter().copied().collect();
        let mut by_block = BTreeMap::new();
        let mut fold = ChainFold::new(floor);
        for number in numbers {
            fold = self.extend(fold, number).await?;
            by_block.insert(number, fold.finish());
        }

        for (record, number) in records.iter_mut().zip(&blocks) {
            record.chain_hash = by_block.get(number).cloned();
        }
        Ok(records)
    }

    /// Evaluate a history query and annotate its records.
    ///
    /// An empty history is `NotFound`.
    pub async fn query_history(&self, function: &str, args: &Value, floor: BlockNumber) -> CustodyResult<Vec<HistoryRecord>> {
        let payload = serde_json::to_vec(args)
            .map_err(|e| CustodyError::InvalidInput(format!("unserializable arguments: {}", e)))?;
        let raw = self.ledger.evaluate_transaction(function, &payload).await?;

        if raw.is_empty() {
            return Err(CustodyError::NotFound(format!("{} returned no records", function)));
        }
        let records: Vec<HistoryRecord> = serde_json::from_slice(&raw)
            .map_err(|e| CustodyError::lookup("ledger", format!("malformed {} response: {}", function, e)))?;
        if records.is_empty() {
            return Err(CustodyError::NotFound(format!("{} returned no records", function)));
        }

        self.annotate_history(records, floor).await
    }
}
