// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use async_trait::async_trait;
use custody_kernel::types::EvidenceDocument;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::check_status;
use crate::errors::{CustodyError, CustodyResult};
use crate::evidence::DocumentStore;

const COLLABORATOR: &str = "document store";
const FIND_LIMIT: usize = 50;

#[derive(Deserialize)]
struct FindResponse {
    #[serde(default)]
    docs: Vec<CouchEvidence>,
}

#[derive(Deserialize)]
struct CouchEvidence {
    path: String,
    #[serde(default)]
    content_type: String,
    hash: String,
    #[serde(default)]
    thumbnail: Option<CouchThumbnail>,
}

#[derive(Deserialize)]
struct CouchThumbnail {
    path: String,
}

impl From<CouchEvidence> for EvidenceDocument {
    fn from(doc: CouchEvidence) -> Self {
        EvidenceDocument {
            path: doc.path,
            content_type: doc.content_type,
            content_hash: doc.hash,
            thumbnail_path: doc.thumbnail.map(|t| t.path),
        }
    }
}

/// Evidence documents kept in a CouchDB database, one document per
/// uploaded file, tagged with the bundle id in `form_id`.
#[derive(Debug, Clone)]
pub struct CouchDocumentStore {
    base_url: String,
    db: String,
    request_timeout: Duration,
    client: Client,
}

impl CouchDocumentStore {
    pub fn new(url: &str, db: &str, request_timeout: Duration) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            db: db.to_string(),
            request_timeout,
            client: Client::new(),
        }
    }
}

/// Mango query selecting every evidence document of a bundle.
pub(crate) fn find_query(bundle_id: &str) -> serde_json::Value {
    json!({
        "selector": { "form_id": { "$eq": bundle_id } },
        "fields": ["path", "form_id", "content_type", "thumbnail.path", "hash"],
        "limit": FIND_LIMIT,
    })
}

#[async_trait]
impl DocumentStore for CouchDocumentStore {
    async fn list_documents(&self, bundle_id: &str) -> CustodyResult<Vec<EvidenceDocument>> {
        if bundle_id.trim().is_empty() {
            return Err(CustodyError::InvalidInput("empty evidence bundle id".into()));
        }

        let url = format!("{}/{}/_find", self.base_url, self.db);
        let resp = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&find_query(bundle_id))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CustodyError::Timeout {
                        what: format!("evidence lookup for bundle {}", bundle_id),
                        after: self.request_timeout,
                    }
                } else {
                    CustodyError::lookup(COLLABORATOR, e)
                }
            })?;
        let resp = check_status(resp, COLLABORATOR, &format!("evidence database {}", self.db))?;

        let found: FindResponse = resp
            .json()
            .await
            .map_err(|e| CustodyError::lookup(COLLABORATOR, format!("malformed _find response: {}", e)))?;
        Ok(found.docs.into_iter().map(EvidenceDocument::from).collect())
    }
}
