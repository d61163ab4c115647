// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Persisted checksum state and its on-disk container.
//!
//! # Format
//! ```text
//! [MAGIC: u32 "CKSM"][VERSION: u32][LEN: u32][JSON: LEN bytes][CRC32: u32]
//! ```
//! All integers little endian. The CRC covers everything before it.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::hash::empty_digest;
use crate::types::BlockNumber;

const MAGIC: u32 = 0x4D534B43; // CKSM
const SCHEMA_VERSION: u32 = 1;
const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = 4;

/// Audit baseline: the chain fold up to (not including) `last_verified_block`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumState {
    pub rolling_hash: String,
    pub last_verified_block: BlockNumber,
}

impl ChecksumState {
    /// State for an empty range starting at `floor`.
    pub fn genesis(floor: BlockNumber) -> Self {
        Self {
            rolling_hash: empty_digest(),
            last_verified_block: floor,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        // Two plain fields; serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        let mut out = Vec::with_capacity(HEADER_LEN + json.len() + TRAILER_LEN);
        out.extend_from_slice(&MAGIC.to_le_bytes());
        out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&json);

        let mut hasher = Hasher::new();
        hasher.update(&out);
        out.extend_from_slice(&hasher.finalize().to_le_bytes());
        out
    }

    pub fn decode(buffer: &[u8]) -> KernelResult<Self> {
        if buffer.len() < HEADER_LEN + TRAILER_LEN {
            return Err(corrupt("container too short"));
        }

        let (content, trailer) = buffer.split_at(buffer.len() - TRAILER_LEN);
        let stored_crc = read_u32(trailer, 0);
        let mut hasher = Hasher::new();
        hasher.update(content);
        if hasher.finalize() != stored_crc {
            return Err(corrupt("checksum mismatch"));
        }

        if read_u32(content, 0) != MAGIC {
            return Err(corrupt("invalid magic"));
        }
        let version = read_u32(content, 4);
        if version != SCHEMA_VERSION {
            return Err(corrupt(&format!("unsupported version {}", version)));
        }

        let len = read_u32(content, 8) as usize;
        if content.len() - HEADER_LEN != len {
            return Err(corrupt(&format!(
                "header claims {} bytes, found {}",
                len,
                content.len() - HEADER_LEN
            )));
        }

        let state: ChecksumState = serde_json::from_slice(&content[HEADER_LEN..])
            .map_err(|e| corrupt(&e.to_string()))?;
        if hex::decode(&state.rolling_hash).is_err() {
            return Err(KernelError::InvalidHex(state.rolling_hash));
        }
        Ok(state)
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}

fn corrupt(msg: &str) -> KernelError {
    KernelError::CorruptChecksum(msg.to_string())
}
