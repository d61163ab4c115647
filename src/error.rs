// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A digest or block hash was not valid hex.
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),
    /// Checksum container failed magic, version or CRC validation.
    #[error("corrupt checksum state: {0}")]
    CorruptChecksum(String),
    /// A fold was asked to absorb a block out of sequence.
    #[error("block {got} out of sequence, expected {expected}")]
    OutOfSequence { expected: u64, got: u64 },
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
