// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Canonical SHA-256 Hashing
//!
//! One hash function for the whole subsystem: SHA-256, rendered as
//! lowercase hex. There is no negotiation and no versioning; the
//! integrity hashes already written to the ledger were produced this way
//! and every recomputation has to match them byte for byte.

use sha2::{Digest, Sha256};

/// Length in bytes of a raw digest.
pub const DIGEST_LEN: usize = 32;

/// Hex digest of the empty input.
///
/// `e3b0c442...b855`. Used for evidence-less transactions and for an empty
/// block range.
pub fn empty_digest() -> String {
    digest(b"")
}

/// Hash `data` and return the lowercase hex digest.
pub fn digest(data: &[u8]) -> String {
    hex::encode(digest_bytes(data))
}

/// Hash `data` and return the raw 32 byte digest.
pub fn digest_bytes(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}

/// Hash the concatenation of `parts` without building the joined buffer.
pub fn digest_concat(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}
