// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

pub type BlockNumber = u64;

/// A committed ledger block, reduced to what the custody fold needs.
///
/// Read-only for this subsystem. `data_hash` travels as hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub number: BlockNumber,
    #[serde(with = "hex")]
    pub data_hash: Vec<u8>,
}

impl Block {
    pub fn new(number: BlockNumber, data_hash: impl Into<Vec<u8>>) -> Self {
        Self {
            number,
            data_hash: data_hash.into(),
        }
    }

    /// Lowercase hex of the data hash, the form folded into the chain digest.
    pub fn data_hash_hex(&self) -> String {
        hex::encode(&self.data_hash)
    }
}
