// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! custody-kernel: deterministic chain-of-custody primitives.
//!
//! Everything in this crate is pure: no I/O, no clocks, no randomness.
//! The node crate feeds ledger blocks and evidence digests in, this crate
//! folds them into the hashes that end up on-chain and in the checksum file.

pub mod error;
pub mod hash;
pub mod types;
pub mod evidence;
pub mod integrity;
pub mod chain;
pub mod checksum;

#[cfg(test)]
mod tests;
