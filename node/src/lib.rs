// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod ledger;
pub mod evidence;
pub mod tracker;
pub mod binder;
pub mod recompute;
pub mod persistence;
pub mod reconcile;
pub mod network;
pub mod service;

pub use binder::IntegrityBinder;
pub use errors::{CustodyError, CustodyResult};
pub use evidence::EvidenceDigestAggregator;
pub use recompute::ChainRecomputer;
pub use reconcile::ReconciliationJob;
pub use service::CustodyService;
pub use tracker::LedgerBlockTracker;
