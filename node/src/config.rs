// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use custody_kernel::types::BlockNumber;

use crate::errors::{CustodyError, CustodyResult};
use crate::ledger::StartOffset;

/// First block folded into the chain hash in current deployments.
pub const DEFAULT_FLOOR_BLOCK: BlockNumber = 6;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub channel: String,
    pub chaincode: String,
    pub gateway_url: String,
    pub document_store_url: String,
    pub document_db: String,
    pub checksum_path: PathBuf,
    pub floor_block: BlockNumber,
    pub fetch_timeout: Duration,
    pub fetch_batch_size: u64,
    pub init_wait: Duration,
    pub reconcile_interval: Option<Duration>,
    pub subscribe_from: StartOffset,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            channel: "mychannel".to_string(),
            chaincode: "supplychain-cc".to_string(),
            gateway_url: "http://127.0.0.1:7080".to_string(),
            document_store_url: "http://127.0.0.1:5984".to_string(),
            document_db: "mychannel".to_string(),
            checksum_path: PathBuf::from("checksum.bin"),
            floor_block: DEFAULT_FLOOR_BLOCK,
            fetch_timeout: Duration::from_secs(30),
            fetch_batch_size: 16,
            init_wait: Duration::from_secs(2),
            reconcile_interval: None,
            subscribe_from: StartOffset::Head,
            metrics_addr: None,
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by `CUSTODY_*` environment variables.
    pub fn from_env() -> CustodyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CustodyResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("CUSTODY_CHANNEL") {
            cfg.document_db = v.clone();
            cfg.channel = v;
        }
        if let Some(v) = lookup("CUSTODY_CHAINCODE") {
            cfg.chaincode = v;
        }
        if let Some(v) = lookup("CUSTODY_GATEWAY_URL") {
            cfg.gateway_url = v;
        }
        if let Some(v) = lookup("CUSTODY_DOCUMENT_STORE_URL") {
            cfg.document_store_url = v;
        }
        if let Some(v) = lookup("CUSTODY_DOCUMENT_DB") {
            cfg.document_db = v;
        }
        if let Some(v) = lookup("CUSTODY_CHECKSUM_PATH") {
            cfg.checksum_path = PathBuf::from(v);
        }
        if let Some(v) = parse(&lookup, "CUSTODY_FLOOR_BLOCK")? {
            cfg.floor_block = v;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "CUSTODY_FETCH_TIMEOUT_MS")? {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse(&lookup, "CUSTODY_FETCH_BATCH_SIZE")? {
            if v == 0 {
                return Err(CustodyError::InvalidInput(
                    "CUSTODY_FETCH_BATCH_SIZE must be positive".into(),
                ));
            }
            cfg.fetch_batch_size = v;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "CUSTODY_INIT_WAIT_MS")? {
            cfg.init_wait = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64, _>(&lookup, "CUSTODY_RECONCILE_INTERVAL_SECS")? {
            cfg.reconcile_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = lookup("CUSTODY_SUBSCRIBE_FROM") {
            cfg.subscribe_from = v.parse()?;
        }
        if let Some(addr) = parse(&lookup, "CUSTODY_METRICS_ADDR")? {
            cfg.metrics_addr = Some(addr);
        }

        Ok(cfg)
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> CustodyResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CustodyError::InvalidInput(format!("{}={:?}: {}", key, raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = NodeConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.floor_block, DEFAULT_FLOOR_BLOCK);
        assert_eq!(cfg.channel, "mychannel");
        assert_eq!(cfg.subscribe_from, StartOffset::Head);
        assert!(cfg.reconcile_interval.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = NodeConfig::from_lookup(lookup_from(&[
            ("CUSTODY_CHANNEL", "audit"),
            ("CUSTODY_FLOOR_BLOCK", "0"),
            ("CUSTODY_FETCH_TIMEOUT_MS", "250"),
            ("CUSTODY_RECONCILE_INTERVAL_SECS", "60"),
            ("CUSTODY_SUBSCRIBE_FROM", "12"),
        ]))
        .unwrap();
        assert_eq!(cfg.channel, "audit");
        assert_eq!(cfg.document_db, "audit");
        assert_eq!(cfg.floor_block, 0);
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(250));
        assert_eq!(cfg.reconcile_interval, Some(Duration::from_secs(60)));
        assert_eq!(cfg.subscribe_from, StartOffset::Block(12));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = NodeConfig::from_lookup(lookup_from(&[("CUSTODY_FLOOR_BLOCK", "six")])).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidInput(_)));

        let err = NodeConfig::from_lookup(lookup_from(&[("CUSTODY_FETCH_BATCH_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, CustodyError::InvalidInput(_)));
    }
}
