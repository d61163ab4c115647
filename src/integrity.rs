// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Integrity hash composition.
//!
//! ```text
//! integrity = SHA256( block_hash_bytes || evidence_digest_hex )
//! ```
//!
//! Block hash first, evidence digest second. The chain recomputation and
//! any offline verifier rebuild the value in exactly this order.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::hash::digest_concat;

/// Compute the integrity hash binding a block hash to an evidence digest.
pub fn integrity_hash(block_hash: &[u8], evidence_digest: &str) -> String {
    digest_concat(&[block_hash, evidence_digest.as_bytes()])
}

/// Everything that went into one integrity hash, kept together so it can be
/// reported back to the caller and re-checked later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityBinding {
    /// Hex of the ledger block hash observed at bind time.
    pub block_hash: String,
    pub evidence_digest: String,
    pub integrity_hash: String,
}

impl IntegrityBinding {
    pub fn new(block_hash: &[u8], evidence_digest: String) -> Self {
        let integrity_hash = integrity_hash(block_hash, &evidence_digest);
        Self {
            block_hash: hex::encode(block_hash),
            evidence_digest,
            integrity_hash,
        }
    }

    /// Recompute from the recorded inputs and compare.
    pub fn verify(&self) -> KernelResult<bool> {
        let block_hash = hex::decode(&self.block_hash)
            .map_err(|_| KernelError::InvalidHex(self.block_hash.clone()))?;
        Ok(integrity_hash(&block_hash, &self.evidence_digest) == self.integrity_hash)
    }
}
