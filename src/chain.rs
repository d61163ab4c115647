// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Rolling chain fold over ledger blocks.
//!
//! ```text
//! acc = ""
//! for block in floor..target:
//!     acc = SHA256(acc ++ hex(block.data_hash))
//! ```
//!
//! The fold is order dependent, so [`ChainFold::absorb`] only accepts the
//! next block number in sequence. An empty range finishes as the digest of
//! the empty string.

use crate::checksum::ChecksumState;
use crate::error::{KernelError, KernelResult};
use crate::hash::{digest, empty_digest};
use crate::types::{Block, BlockNumber};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFold {
    floor: BlockNumber,
    next: BlockNumber,
    acc: String,
}

impl ChainFold {
    /// Start a fresh fold whose first block is `floor`.
    pub fn new(floor: BlockNumber) -> Self {
        Self {
            floor,
            next: floor,
            acc: String::new(),
        }
    }

    /// Continue a previously persisted fold.
    ///
    /// A state that never moved past `floor` restarts from scratch, since its
    /// stored hash is the empty-range digest rather than a fold accumulator.
    pub fn resume(floor: BlockNumber, state: &ChecksumState) -> Self {
        if state.last_verified_block <= floor {
            return Self::new(floor);
        }
        Self {
            floor,
            next: state.last_verified_block,
            acc: state.rolling_hash.clone(),
        }
    }

    pub fn floor(&self) -> BlockNumber {
        self.floor
    }

    /// Number of the block the fold expects next (exclusive end of the range so far).
    pub fn next_block(&self) -> BlockNumber {
        self.next
    }

    pub fn absorb(&mut self, block: &Block) -> KernelResult<()> {
        if block.number != self.next {
            return Err(KernelError::OutOfSequence {
                expected: self.next,
                got: block.number,
            });
        }
        self.acc.push_str(&block.data_hash_hex());
        self.acc = digest(self.acc.as_bytes());
        self.next += 1;
        Ok(())
    }

    pub fn finish(&self) -> String {
        if self.next == self.floor {
            empty_digest()
        } else {
            self.acc.clone()
        }
    }

    pub fn to_state(&self) -> ChecksumState {
        ChecksumState {
            rolling_hash: self.finish(),
            last_verified_block: self.next,
        }
    }
}

/// Fold a complete, ascending block sequence starting at `floor`.
pub fn fold_blocks<'a, I>(floor: BlockNumber, blocks: I) -> KernelResult<String>
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut fold = ChainFold::new(floor);
    for block in blocks {
        fold.absorb(block)?;
    }
    Ok(fold.finish())
}
