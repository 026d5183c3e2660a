// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Peer registry.
//!
//! The registry is the fixed set of ledger participants known at startup. It is
//! built once from configuration and handed to whoever needs it; nothing in
//! the kernel keeps it in a global.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::types::id::PeerId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    /// Base URL of the peer's HTTP endpoint.
    #[serde(alias = "domain")]
    pub address: String,
}

#[derive(Clone, Debug)]
pub struct PeerRegistry {
    self_id: PeerId,
    /// Sorted by id.
    peers: Vec<Peer>,
}

impl PeerRegistry {
    /// Builds the registry for the node identified by `self_id`.
    ///
    /// `peers` may or may not list the local node itself; ids must be unique.
    pub fn new(self_id: PeerId, mut peers: Vec<Peer>) -> Result<Self> {
        peers.sort_by_key(|p| p.id);
        if let Some(dup) = peers.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(KernelError::DuplicatePeer(dup[0].id.0));
        }
        Ok(Self { self_id, peers })
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers
            .binary_search_by_key(&id, |p| p.id)
            .ok()
            .map(|i| &self.peers[i])
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Every registered peer except the local node.
    pub fn remotes(&self) -> impl Iterator<Item = &Peer> {
        let self_id = self.self_id;
        self.peers.iter().filter(move |p| p.id != self_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
