// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

/// One off-ledger evidence file (image or video) attached to a form submission.
///
/// Owned by the document store. `content_hash` is computed by the store at
/// upload time; this subsystem only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    pub path: String,
    pub content_type: String,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

impl EvidenceDocument {
    pub fn new(path: impl Into<String>, content_type: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            content_hash: content_hash.into(),
            thumbnail_path: None,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail_path: impl Into<String>) -> Self {
        self.thumbnail_path = Some(thumbnail_path.into());
        self
    }
}
