// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use ledger_kernel::error::KernelError;
use ledger_kernel::seq::next_seq;
use ledger_kernel::types::id::{EntryId, PeerId};
use ledger_kernel::types::row::{ArchiveRow, QueueRow};

use super::row_log::RowLog;
use super::{ArchiveQuery, LedgerDb, StoreError};

const QUEUE_LOG: &str = "queue.log";
const ARCHIVE_LOG: &str = "archive.log";

#[derive(Default)]
struct Tables {
    queue: Vec<QueueRow>,
    next_id: EntryId,
    /// Keyed by partition, then seq.
    archive: BTreeMap<(PeerId, u64), ArchiveRow>,
}

impl Tables {
    fn max_seq(&self, peer: PeerId) -> Option<u64> {
        self.archive
            .range((peer, 0)..=(peer, u64::MAX))
            .next_back()
            .map(|((_, seq), _)| *seq)
    }

    /// Checks that `rows` continue `peer`'s partition without a hole.
    fn check_extends(&self, peer: PeerId, rows: &[ArchiveRow]) -> Result<(), KernelError> {
        let mut expected = next_seq(self.max_seq(peer))?;
        for row in rows {
            if row.peer_id != peer {
                return Err(KernelError::ForeignRow { expected: peer.0, found: row.peer_id.0 });
            }
            if row.seq < expected {
                return Err(KernelError::Overlap { seq: row.seq });
            }
            if row.seq > expected {
                return Err(KernelError::Gap { expected, found: row.seq });
            }
            expected = expected.checked_add(1).ok_or(KernelError::Overflow)?;
        }
        Ok(())
    }

    fn insert_queue(&mut self, row: QueueRow) {
        if row.id >= self.next_id {
            self.next_id = row.id.next();
        }
        self.queue.push(row);
    }

    fn insert_archive(&mut self, rows: &[ArchiveRow]) {
        for row in rows {
            self.archive.insert((row.peer_id, row.seq), row.clone());
        }
    }
}

struct Logs {
    queue: RowLog<QueueRow>,
    archive: RowLog<ArchiveRow>,
}

/// Table store kept in memory, optionally mirrored to append-only logs.
pub struct MemoryDb {
    tables: RwLock<Tables>,
    logs: Option<Mutex<Logs>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables { next_id: EntryId(1), ..Default::default() }),
            logs: None,
        }
    }

    /// Opens the logs under `dir` and rebuilds the tables from them.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(super::RowLogError::from)?;

        let (queue_log, queue_rows) = RowLog::<QueueRow>::open(dir.join(QUEUE_LOG))?;
        let (archive_log, archive_rows) = RowLog::<ArchiveRow>::open(dir.join(ARCHIVE_LOG))?;

        let mut tables = Tables { next_id: EntryId(1), ..Default::default() };
        for row in queue_rows {
            tables.insert_queue(row);
        }
        for row in archive_rows {
            tables
                .check_extends(row.peer_id, std::slice::from_ref(&row))
                .map_err(StoreError::Integrity)?;
            tables.insert_archive(std::slice::from_ref(&row));
        }

        tracing::info!(
            "Ledger store opened at {:?}: {} queued, {} archived",
            dir,
            tables.queue.len(),
            tables.archive.len()
        );

        Ok(Self {
            tables: RwLock::new(tables),
            logs: Some(Mutex::new(Logs { queue: queue_log, archive: archive_log })),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.logs.is_some()
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerDb for MemoryDb {
    fn insert_queue(&self, mut row: QueueRow) -> Result<EntryId, StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        row.id = tables.next_id;

        if let Some(logs) = &self.logs {
            let mut logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
            logs.queue.append(&row)?;
        }

        let id = row.id;
        tables.insert_queue(row);
        Ok(id)
    }

    fn query_queue(&self, acct: &str, pending_only: bool) -> Result<Vec<QueueRow>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .queue
            .iter()
            .filter(|r| r.acct == acct && (!pending_only || r.is_pending()))
            .cloned()
            .collect())
    }

    fn query_archive(&self, query: &ArchiveQuery) -> Result<Vec<ArchiveRow>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);

        let mut hits: Vec<&ArchiveRow> = tables
            .archive
            .values()
            .filter(|r| query.peer_id.map_or(true, |p| r.peer_id == p))
            .filter(|r| query.typ.map_or(true, |t| r.typ == t))
            .filter(|r| query.acct.as_deref().map_or(true, |a| r.acct == a))
            .filter(|r| query.seq_range.as_ref().map_or(true, |range| range.contains(&r.seq)))
            .collect();

        // Ties across partitions break on peer id.
        hits.sort_by_key(|r| (r.seq, r.peer_id));
        if query.descending {
            hits.reverse();
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(hits.into_iter().skip(query.offset).take(limit).cloned().collect())
    }

    fn append_archive(&self, peer: PeerId, rows: &[ArchiveRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.check_extends(peer, rows).map_err(StoreError::Integrity)?;

        if let Some(logs) = &self.logs {
            let mut logs = logs.lock().unwrap_or_else(PoisonError::into_inner);
            logs.archive.append_all(rows)?;
        }

        tables.insert_archive(rows);
        Ok(())
    }

    fn max_seq(&self, peer: PeerId) -> Result<Option<u64>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables.max_seq(peer))
    }
}
