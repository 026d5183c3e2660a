// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Initialize Tracing (Logs)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ledger_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Initialize Metrics (Prometheus)
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Prometheus recorder not installed: {}", e),
    }

    metrics::describe_counter!("ledger_polls_scheduled_total", "Poll requests issued to remote peers");
    metrics::describe_counter!("ledger_rows_committed_total", "Archive rows committed from remote peers");
    metrics::describe_counter!("ledger_poll_failures_total", "Polls that ended in a network or peer failure");
    metrics::describe_counter!("ledger_data_errors_total", "Peers suspended for inconsistent data");
    metrics::describe_counter!("ledger_entries_entered_total", "Entries added to the local queue");
    metrics::describe_histogram!("ledger_tick_duration_seconds", "Time spent in one replication tick");

    metrics::gauge!("ledger_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
