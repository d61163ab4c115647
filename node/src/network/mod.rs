// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod couchdb;
pub mod gateway;

pub use couchdb::CouchDocumentStore;
pub use gateway::HttpLedgerGateway;

use reqwest::{Response, StatusCode};

use crate::errors::{CustodyError, CustodyResult};

/// Map a non-success response onto the error taxonomy: 404 is `NotFound`,
/// anything else a lookup failure of `collaborator`.
pub(crate) fn check_status(resp: Response, collaborator: &'static str, what: &str) -> CustodyResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == StatusCode::NOT_FOUND {
        Err(CustodyError::NotFound(what.to_string()))
    } else {
        Err(CustodyError::lookup(collaborator, format!("{} failed: {}", what, status)))
    }
}
