// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Contiguity checks for rows pulled from a remote partition.

use crate::error::{KernelError, Result};
use crate::seq::{block_range, next_seq};
use crate::types::id::PeerId;
use crate::types::row::ArchiveRow;

/// Validates a poll response for `block_id` of `peer`'s partition and returns
/// the rows that extend the local copy.
///
/// A responder sends every row it holds inside the block, so rows at or below
/// `last_known` are the already-committed prefix of a partially filled block.
/// Each of them must equal its counterpart in `committed` (the local rows of
/// the same block, ascending) and is then skipped. Everything else must be:
/// - owned by `peer` and inside the requested block,
/// - strictly ascending by exactly one,
/// - starting at the seq right after `last_known` (zero when nothing is known).
///
/// Any violation rejects the whole response; nothing is partially accepted.
pub fn verify_block<'a>(
    peer: PeerId,
    block_id: u64,
    last_known: Option<u64>,
    committed: &[ArchiveRow],
    rows: &'a [ArchiveRow],
) -> Result<&'a [ArchiveRow]> {
    let range = block_range(block_id)?;

    let mut prev: Option<u64> = None;
    for row in rows {
        if row.peer_id != peer {
            return Err(KernelError::ForeignRow {
                expected: peer.0,
                found: row.peer_id.0,
            });
        }
        if !range.contains(&row.seq) {
            return Err(KernelError::OutsideBlock { seq: row.seq, block_id });
        }
        if let Some(p) = prev {
            if row.seq <= p {
                return Err(KernelError::Overlap { seq: row.seq });
            }
            if row.seq != p + 1 {
                return Err(KernelError::Gap { expected: p + 1, found: row.seq });
            }
        }
        prev = Some(row.seq);
    }

    let skip = match last_known {
        Some(last) => rows.iter().take_while(|r| r.seq <= last).count(),
        None => 0,
    };
    let (resent, fresh) = rows.split_at(skip);

    for row in resent {
        let stored = committed
            .binary_search_by_key(&row.seq, |c| c.seq)
            .ok()
            .map(|i| &committed[i]);
        if stored != Some(row) {
            return Err(KernelError::Divergent { seq: row.seq });
        }
    }

    if let Some(first) = fresh.first() {
        let expected = next_seq(last_known)?;
        if first.seq != expected {
            return Err(KernelError::Gap { expected, found: first.seq });
        }
    }

    Ok(fresh)
}
