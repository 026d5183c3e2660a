// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use ledger_kernel::types::id::{EntryId, PeerId};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct EnterResponse {
    pub id: EntryId,
}

/// One row of `GET /peers`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PeerStatusView {
    pub id: PeerId,
    pub address: String,
    pub status: String,
    pub error: Option<String>,
}
