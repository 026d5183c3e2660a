// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger rows.
//!
//! `QueueRow` is the unsequenced staging form of an entry; `ArchiveRow` is the
//! immutable, sequenced form kept per peer partition. Field names on the wire
//! and in storage follow the `queue` / `archive` table projections.

use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::seq::{resolve, SeqAddr};
use crate::types::amount::Amount;
use crate::types::id::{EntryId, PeerId};

/// Status of a queue row that has not been promoted yet.
pub const QUEUE_PENDING: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRow {
    pub id: EntryId,
    pub acct: String,
    pub name: String,
    pub remark: String,
    pub amt: Amount,
    /// Unix milliseconds.
    pub stamp: i64,
    pub status: u8,
}

impl QueueRow {
    pub fn is_pending(&self) -> bool {
        self.status == QUEUE_PENDING
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRow {
    #[serde(rename = "peerid")]
    pub peer_id: PeerId,
    pub seq: u64,
    pub typ: i16,
    pub acct: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub amt: Amount,
    /// Unix milliseconds.
    #[serde(default)]
    pub stamp: i64,
}

impl ArchiveRow {
    pub fn addr(&self) -> SeqAddr {
        resolve(self.seq)
    }
}
