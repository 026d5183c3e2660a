// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Queue and archive operations over a [`LedgerDb`].
//!
//! The queue is the unsequenced staging area that local writers feed through
//! [`Ledger::enter`]. Promotion of queued entries into this node's own archive
//! partition happens outside this crate. Remote partitions only ever grow
//! through [`Ledger::commit`], called by the replication scheduler once a
//! batch has passed the contiguity check.

use std::time::{SystemTime, UNIX_EPOCH};

use ledger_kernel::seq::block_range;
use ledger_kernel::types::amount::Amount;
use ledger_kernel::types::id::{EntryId, PeerId};
use ledger_kernel::types::row::{ArchiveRow, QueueRow, QUEUE_PENDING};

use crate::errors::EngineError;
use crate::store::{ArchiveQuery, LedgerDb};

pub struct Ledger<D: LedgerDb> {
    db: D,
    self_id: PeerId,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl<D: LedgerDb> Ledger<D> {
    pub fn new(db: D, self_id: PeerId) -> Self {
        Self { db, self_id }
    }

    pub fn self_id(&self) -> PeerId {
        self.self_id
    }

    /// Stages a new entry with status pending and the current time.
    pub fn enter(&self, acct: &str, name: &str, remark: &str, amt: Amount) -> Result<EntryId, EngineError> {
        if acct.is_empty() {
            return Err(EngineError::InvalidInput("account is required".to_string()));
        }

        let row = QueueRow {
            id: EntryId(0),
            acct: acct.to_string(),
            name: name.to_string(),
            remark: remark.to_string(),
            amt,
            stamp: now_millis(),
            status: QUEUE_PENDING,
        };
        let id = self.db.insert_queue(row)?;

        metrics::counter!("ledger_entries_entered_total", 1);
        tracing::debug!("Entered {:?} for account {}", id, acct);
        Ok(id)
    }

    /// Newest archived row of `(typ, acct)` in any partition.
    pub fn latest_archive(&self, typ: i16, acct: &str) -> Result<Option<ArchiveRow>, EngineError> {
        let rows = self.db.query_archive(&ArchiveQuery {
            typ: Some(typ),
            acct: Some(acct.to_string()),
            descending: true,
            limit: Some(1),
            ..Default::default()
        })?;
        Ok(rows.into_iter().next())
    }

    /// One page of this node's own partition for `(typ, acct)`, newest first.
    pub fn seek_archive(&self, typ: i16, acct: &str, limit: usize, page: usize) -> Result<Vec<ArchiveRow>, EngineError> {
        if acct.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let offset = page
            .checked_mul(limit)
            .ok_or_else(|| EngineError::InvalidInput(format!("page {} out of range", page)))?;

        Ok(self.db.query_archive(&ArchiveQuery {
            peer_id: Some(self.self_id),
            typ: Some(typ),
            acct: Some(acct.to_string()),
            descending: true,
            limit: Some(limit),
            offset,
            ..Default::default()
        })?)
    }

    /// Entries of `acct` still waiting to be sequenced.
    pub fn seek_queue(&self, acct: &str) -> Result<Vec<QueueRow>, EngineError> {
        if acct.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.db.query_queue(acct, true)?)
    }

    /// Appends verified rows to `peer`'s partition.
    pub fn commit(&self, peer: PeerId, rows: &[ArchiveRow]) -> Result<(), EngineError> {
        self.db.append_archive(peer, rows)?;
        metrics::counter!("ledger_rows_committed_total", rows.len() as u64);
        Ok(())
    }

    pub fn last_seq(&self, peer: PeerId) -> Result<Option<u64>, EngineError> {
        Ok(self.db.max_seq(peer)?)
    }

    /// Rows of `peer`'s partition inside one block, ascending.
    pub fn block(&self, peer: PeerId, block_id: u64) -> Result<Vec<ArchiveRow>, EngineError> {
        let range = block_range(block_id)?;
        Ok(self.db.query_archive(&ArchiveQuery {
            peer_id: Some(peer),
            seq_range: Some(range),
            ..Default::default()
        })?)
    }
}
