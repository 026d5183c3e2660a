// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ledger_kernel::error::KernelError;
use ledger_kernel::peer::{Peer, PeerRegistry};
use ledger_kernel::types::id::PeerId;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid peer list: {0}")]
    Registry(KernelError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's own peer id.
    pub self_id: PeerId,
    pub bind_addr: SocketAddr,
    /// Every known ledger participant, optionally including this node.
    pub peers: Vec<Peer>,
    /// Period of the replication loop.
    pub tick_interval_ms: u64,
    /// Directory for the durable queue/archive logs. Memory only when unset.
    pub data_dir: Option<PathBuf>,
    /// Bearer token guarding the admin routes.
    pub auth_token: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            self_id: PeerId(1),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7000)),
            peers: Vec::new(),
            tick_interval_ms: 1000,
            data_dir: None,
            auth_token: None,
        }
    }
}

impl NodeConfig {
    /// Reads a JSON config file. Missing fields fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn registry(&self) -> Result<PeerRegistry, ConfigError> {
        PeerRegistry::new(self.self_id, self.peers.clone()).map_err(ConfigError::Registry)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
