// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::evidence::aggregate_digest;
use crate::hash::{digest, empty_digest};
use crate::types::EvidenceDocument;

fn doc(hash: &str) -> EvidenceDocument {
    EvidenceDocument::new("images/descriptions/x.png", "image/png", hash)
}

#[test]
fn test_two_documents_concatenate_in_store_order() {
    let docs = vec![doc("aa"), doc("bb")];
    assert_eq!(aggregate_digest(&docs), digest(b"aabb"));
}

#[test]
fn test_order_matters() {
    let forward = vec![doc("aa"), doc("bb")];
    let reversed = vec![doc("bb"), doc("aa")];
    assert_ne!(aggregate_digest(&forward), aggregate_digest(&reversed));
}

#[test]
fn test_no_documents_is_empty_digest() {
    let docs: Vec<EvidenceDocument> = Vec::new();
    assert_eq!(aggregate_digest(&docs), empty_digest());
}

#[test]
fn test_thumbnail_does_not_affect_digest() {
    let plain = vec![doc("aa")];
    let with_thumb = vec![doc("aa").with_thumbnail("images/descriptions/t.png")];
    assert_eq!(aggregate_digest(&plain), aggregate_digest(&with_thumb));
}
