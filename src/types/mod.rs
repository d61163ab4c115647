// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod block;
pub mod evidence;

pub use block::{Block, BlockNumber};
pub use evidence::EvidenceDocument;
