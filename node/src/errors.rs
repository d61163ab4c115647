// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::fmt::Display;
use std::time::Duration;

use custody_kernel::error::KernelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CustodyError {
    /// Ledger or document store unreachable or answered with an error.
    #[error("{collaborator} lookup failed: {reason}")]
    LookupFailure {
        collaborator: &'static str,
        reason: String,
    },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },
    /// Bundle, block or transaction absent.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("checksum diverged: persisted {persisted}, recomputed {recomputed}")]
    InconsistencyDetected {
        persisted: String,
        recomputed: String,
    },
    #[error("block tracker has not observed a block yet")]
    InitializationPending,
    #[error("ledger returned block {got}, expected {expected}")]
    UnexpectedBlock { expected: u64, got: u64 },
    #[error("checksum persistence error: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("corrupt checksum state: {0}")]
    CorruptChecksum(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type CustodyResult<T> = std::result::Result<T, CustodyError>;

impl CustodyError {
    pub fn lookup(collaborator: &'static str, reason: impl Display) -> Self {
        CustodyError::LookupFailure {
            collaborator,
            reason: reason.to_string(),
        }
    }

    /// True for failures to reach a collaborator, timeouts included.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(
            self,
            CustodyError::LookupFailure { .. } | CustodyError::Timeout { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CustodyError::NotFound(_))
    }
}

impl From<KernelError> for CustodyError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::OutOfSequence { expected, got } => {
                CustodyError::UnexpectedBlock { expected, got }
            }
            KernelError::CorruptChecksum(msg) => CustodyError::CorruptChecksum(msg),
            KernelError::InvalidHex(h) => CustodyError::CorruptChecksum(format!("invalid hex {}", h)),
        }
    }
}
