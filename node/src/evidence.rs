// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Evidence bundles and their aggregate digest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use custody_kernel::evidence::aggregate_digest;
use custody_kernel::types::EvidenceDocument;

use crate::errors::{CustodyError, CustodyResult};

/// Off-ledger store holding the evidence documents of each bundle.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of `bundle_id`, in the store's own order. An existing
    /// but empty bundle is `Ok(vec![])`, not an error.
    async fn list_documents(&self, bundle_id: &str) -> CustodyResult<Vec<EvidenceDocument>>;
}

#[derive(Clone)]
pub struct EvidenceDigestAggregator {
    store: Arc<dyn DocumentStore>,
    lookup_timeout: Duration,
}

impl EvidenceDigestAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Aggregate digest of the bundle's documents.
    ///
    /// A failed or timed out lookup is returned as an error. It is never
    /// replaced by the empty digest.
    pub async fn aggregate_digest(&self, bundle_id: &str) -> CustodyResult<String> {
        let documents = tokio::time::timeout(self.lookup_timeout, self.store.list_documents(bundle_id))
            .await
            .map_err(|_| CustodyError::Timeout {
                what: format!("evidence lookup for bundle {}", bundle_id),
                after: self.lookup_timeout,
            })??;

        let digest = aggregate_digest(&documents);
        tracing::debug!(
            "Evidence bundle {}: {} document(s), digest {}",
            bundle_id,
            documents.len(),
            digest
        );
        Ok(digest)
    }
}
