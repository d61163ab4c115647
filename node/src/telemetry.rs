// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
///
/// With `metrics_addr` set, Prometheus scrapes an HTTP listener there;
/// otherwise the recorder is installed and [`render_metrics`] exposes it.
pub fn init_telemetry(metrics_addr: Option<SocketAddr>) -> Result<(), BuildError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "custody_node=debug,custody::audit=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match metrics_addr {
        Some(addr) => {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            tracing::info!("Prometheus metrics listening on {}", addr);
        }
        None => {
            let handle = PrometheusBuilder::new().install_recorder()?;
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
    }

    metrics::describe_counter!("custody_tracker_blocks_observed_total", "Block events accepted by the tracker");
    metrics::describe_gauge!("custody_tracker_latest_block", "Number of the latest block observed by the tracker");
    metrics::describe_counter!("custody_tracker_resubscribe_total", "Block subscriptions reopened after the stream ended");
    metrics::describe_counter!("custody_integrity_bound_total", "Transactions bound to an integrity hash");
    metrics::describe_histogram!("custody_chain_recompute_duration_seconds", "Time taken to fold a block range");
    metrics::describe_counter!("custody_reconcile_runs_total", "Reconciliation runs");
    metrics::describe_counter!("custody_reconcile_divergence_total", "Reconciliation runs that resynchronised the checksum");

    metrics::gauge!("custody_node_up", 1.0);
    Ok(())
}

/// Text exposition of the installed recorder, when not served over HTTP.
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
