// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use custody_node::config::NodeConfig;
use custody_node::service::CustodyService;
use custody_node::telemetry::{init_telemetry, render_metrics};

#[tokio::main]
async fn main() {
    let cfg = match NodeConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    init_telemetry(cfg.metrics_addr).expect("failed to install Prometheus recorder");
    tracing::info!("Initializing custody node with config: {:?}", cfg);

    let metrics_served = cfg.metrics_addr.is_some();
    let service = CustodyService::from_config(cfg).expect("failed to build ledger gateway client");

    if let Err(e) = service.start().await {
        tracing::error!("Failed to load checksum state: {}", e);
        service.shutdown().await;
        std::process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
    service.shutdown().await;

    if !metrics_served {
        tracing::debug!("Final metrics:\n{}", render_metrics());
    }
}
