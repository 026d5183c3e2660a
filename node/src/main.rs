// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ledger_node::config::NodeConfig;
use ledger_node::connection::ConnectionSet;
use ledger_node::ledger::Ledger;
use ledger_node::network::{HttpTransport, REQUEST_TIMEOUT};
use ledger_node::replication::ReplicationScheduler;
use ledger_node::server::{build_router, AppState};
use ledger_node::store::MemoryDb;
use ledger_node::telemetry::init_telemetry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "ledger-node")]
#[command(about = "Ledger node that pulls archive partitions from its peers", long_about = None)]
struct Args {
    /// JSON config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `bind_addr` from the config.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_telemetry();

    let mut cfg = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }
    tracing::info!("Initializing ledger node with config: {:?}", cfg);

    let registry = cfg.registry()?;
    let db = match &cfg.data_dir {
        Some(dir) => {
            tracing::info!("Replaying ledger logs from {:?}", dir);
            MemoryDb::open(dir)?
        }
        None => {
            tracing::warn!("No data_dir configured. Ledger is memory only.");
            MemoryDb::new()
        }
    };
    let ledger = Arc::new(Ledger::new(db, registry.self_id()));

    let transport = Arc::new(HttpTransport::new(REQUEST_TIMEOUT)?);
    let conns = ConnectionSet::connect(&registry, transport).await;
    let scheduler = ReplicationScheduler::new(ledger.clone(), &conns)?;

    let shutdown = CancellationToken::new();
    let replication = tokio::spawn(scheduler.run(cfg.tick_interval(), shutdown.clone()));

    let app = build_router(AppState { ledger, conns }, cfg.auth_token.clone());

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    let token = shutdown.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
            token.cancel();
        })
        .await?;

    shutdown.cancel();
    replication.await?;
    Ok(())
}
