// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Integrity binding at submission time.
//!
//! Every state-changing transaction carries
//! `integrity = SHA256(block_hash || evidence_digest)` plus the raw
//! evidence digest as fields of its JSON arguments. A submission that
//! cannot establish both inputs fails; it is never sent with a default.

use std::sync::Arc;
use std::time::Duration;

use custody_kernel::integrity::IntegrityBinding;
use serde_json::{Map, Value};

use crate::errors::{CustodyError, CustodyResult};
use crate::evidence::EvidenceDigestAggregator;
use crate::ledger::LedgerClient;
use crate::tracker::LedgerBlockTracker;

/// Argument field read by the chaincode as the transaction's integrity hash.
pub const INTEGRITY_HASH_FIELD: &str = "hashvalue";
/// Argument field carrying the evidence aggregate digest.
pub const EVIDENCE_DIGEST_FIELD: &str = "HashValueOffchain";

pub type SubmissionArgs = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct BoundSubmission {
    pub args: SubmissionArgs,
    pub binding: IntegrityBinding,
}

#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub result: Vec<u8>,
    pub binding: IntegrityBinding,
}

pub struct IntegrityBinder {
    aggregator: EvidenceDigestAggregator,
    tracker: Arc<LedgerBlockTracker>,
    ledger: Arc<dyn LedgerClient>,
    init_wait: Duration,
}

impl IntegrityBinder {
    pub fn new(
        aggregator: EvidenceDigestAggregator,
        tracker: Arc<LedgerBlockTracker>,
        ledger: Arc<dyn LedgerClient>,
        init_wait: Duration,
    ) -> Self {
        Self {
            aggregator,
            tracker,
            ledger,
            init_wait,
        }
    }

    /// Add the integrity hash and evidence digest to `args`.
    ///
    /// Existing values under the two field names are overwritten.
    pub async fn bind_integrity(&self, mut args: SubmissionArgs, bundle_id: &str) -> CustodyResult<BoundSubmission> {
        let evidence_digest = self.aggregator.aggregate_digest(bundle_id).await?;
        let block_hash = self.resolve_block_hash().await?;

        let binding = IntegrityBinding::new(&block_hash, evidence_digest);
        args.insert(
            EVIDENCE_DIGEST_FIELD.to_string(),
            Value::String(binding.evidence_digest.clone()),
        );
        args.insert(
            INTEGRITY_HASH_FIELD.to_string(),
            Value::String(binding.integrity_hash.clone()),
        );

        metrics::increment_counter!("custody_integrity_bound_total");
        tracing::debug!(
            "Bound bundle {} to block hash {}: integrity {}",
            bundle_id,
            binding.block_hash,
            binding.integrity_hash
        );
        Ok(BoundSubmission { args, binding })
    }

    /// Bind, then submit `function` with the JSON encoded arguments.
    pub async fn submit_bound(&self, function: &str, args: SubmissionArgs, bundle_id: &str) -> CustodyResult<SubmitReceipt> {
        let bound = self.bind_integrity(args, bundle_id).await?;
        let payload = serde_json::to_vec(&bound.args)
            .map_err(|e| CustodyError::InvalidInput(format!("unserializable arguments: {}", e)))?;

        let result = self.ledger.submit_transaction(function, &payload).await?;
        tracing::info!("Submitted {} with integrity {}", function, bound.binding.integrity_hash);
        Ok(SubmitReceipt {
            result,
            binding: bound.binding,
        })
    }

    /// Tracker value; else wait up to `init_wait` for the first event; else
    /// read the chain head directly.
    pub async fn resolve_block_hash(&self) -> CustodyResult<Vec<u8>> {
        match self.tracker.current_block_hash() {
            Err(CustodyError::InitializationPending) => {}
            other => return other,
        }

        if !self.init_wait.is_zero() {
            match self.tracker.wait_for_block_hash(self.init_wait).await {
                Err(CustodyError::InitializationPending) => {}
                other => return other,
            }
        }

        tracing::debug!(
            "Block tracker for {} still pending, reading chain head",
            self.tracker.channel()
        );
        let head = self.ledger.chain_head().await?;
        Ok(head.data_hash)
    }
}
