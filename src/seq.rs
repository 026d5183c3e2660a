// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequence addressing.
//!
//! A peer's sequence space is cut into fixed blocks of [`BLOCK_CAPACITY`]
//! entries. `resolve` and `weave` convert between a global sequence number and
//! its `(block_id, index)` address; each is the exact inverse of the other.

use core::ops::Range;

use crate::config::BLOCK_CAPACITY;
use crate::error::{KernelError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqAddr {
    pub block_id: u64,
    pub index: u16,
}

impl SeqAddr {
    pub fn seq(&self) -> Result<u64> {
        weave(self.block_id, self.index)
    }
}

/// Splits a sequence number into its block address.
pub fn resolve(seq: u64) -> SeqAddr {
    SeqAddr {
        block_id: seq / BLOCK_CAPACITY,
        index: (seq % BLOCK_CAPACITY) as u16,
    }
}

/// Rebuilds a sequence number from a block address.
pub fn weave(block_id: u64, index: u16) -> Result<u64> {
    if u64::from(index) >= BLOCK_CAPACITY {
        return Err(KernelError::IndexOutOfRange { index });
    }
    block_id
        .checked_mul(BLOCK_CAPACITY)
        .and_then(|base| base.checked_add(u64::from(index)))
        .ok_or(KernelError::Overflow)
}

/// Half-open range of sequence numbers covered by a block.
pub fn block_range(block_id: u64) -> Result<Range<u64>> {
    let start = weave(block_id, 0)?;
    let end = start.checked_add(BLOCK_CAPACITY).ok_or(KernelError::Overflow)?;
    Ok(start..end)
}

/// The sequence number that follows `last`, or zero for an empty partition.
pub fn next_seq(last: Option<u64>) -> Result<u64> {
    match last {
        None => Ok(0),
        Some(s) => s.checked_add(1).ok_or(KernelError::Overflow),
    }
}
