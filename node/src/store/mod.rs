// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Database access for the `queue` and `archive` tables.
//!
//! [`LedgerDb`] is the seam to the relational layer. It offers the three
//! operation shapes the ledger needs: an insert returning a scalar id, filtered
//! queries, and a scalar aggregate (`max(seq)`). Rows cross the seam in their
//! typed projection (`QueueRow`, `ArchiveRow`).

use std::ops::Range;

use ledger_kernel::error::KernelError;
use ledger_kernel::types::id::{EntryId, PeerId};
use ledger_kernel::types::row::{ArchiveRow, QueueRow};
use thiserror::Error;

pub mod memory;
pub mod row_log;

pub use memory::MemoryDb;
pub use row_log::{RowLog, RowLogError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Row log error: {0}")]
    Log(#[from] RowLogError),
    #[error("Archive integrity violation: {0}")]
    Integrity(KernelError),
}

/// Archive selection: `WHERE ... ORDER BY seq [DESC] LIMIT .. OFFSET ..`.
#[derive(Debug, Clone, Default)]
pub struct ArchiveQuery {
    pub peer_id: Option<PeerId>,
    pub typ: Option<i16>,
    pub acct: Option<String>,
    pub seq_range: Option<Range<u64>>,
    pub descending: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub trait LedgerDb: Send + Sync + 'static {
    /// Inserts a queue row and returns the id the store assigned to it.
    /// The incoming `id` is ignored.
    fn insert_queue(&self, row: QueueRow) -> Result<EntryId, StoreError>;

    /// Queue rows of one account in id order.
    fn query_queue(&self, acct: &str, pending_only: bool) -> Result<Vec<QueueRow>, StoreError>;

    fn query_archive(&self, query: &ArchiveQuery) -> Result<Vec<ArchiveRow>, StoreError>;

    /// Appends rows to `peer`'s partition. The batch must continue the
    /// partition exactly; otherwise nothing is written.
    fn append_archive(&self, peer: PeerId, rows: &[ArchiveRow]) -> Result<(), StoreError>;

    /// Highest committed seq of `peer`'s partition.
    fn max_seq(&self, peer: PeerId) -> Result<Option<u64>, StoreError>;
}
