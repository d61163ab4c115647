// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Evidence aggregate digest.
//!
//! The aggregate is `digest(h1 ++ h2 ++ ... ++ hn)` over the documents'
//! precomputed content hashes, taken as text, in the order the store
//! returned them. Order belongs to the store; nothing here re-sorts.

use crate::hash::digest;
use crate::types::EvidenceDocument;

/// Fold the content hashes of `documents` into one aggregate digest.
///
/// Zero documents yields the empty-input digest: an evidence-less
/// transaction is valid.
pub fn aggregate_digest<'a, I>(documents: I) -> String
where
    I: IntoIterator<Item = &'a EvidenceDocument>,
{
    let mut concatenated = String::new();
    for doc in documents {
        concatenated.push_str(&doc.content_hash);
    }
    digest(concatenated.as_bytes())
}
