// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Generic overflow error for arithmetic operations.
    Overflow,
    /// Intra-block index not below the block capacity.
    IndexOutOfRange { index: u16 },
    /// Two registry entries share one peer id.
    DuplicatePeer(i16),
    /// A returned row belongs to another peer's partition.
    ForeignRow { expected: i16, found: i16 },
    /// A returned row lies outside the block that was asked for.
    OutsideBlock { seq: u64, block_id: u64 },
    /// A sequence number was skipped.
    Gap { expected: u64, found: u64 },
    /// A sequence number was repeated or went backwards.
    Overlap { seq: u64 },
    /// A resent row differs from the row already committed at that seq.
    Divergent { seq: u64 },
    /// Amount text could not be parsed.
    InvalidAmount,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Overflow => write!(f, "numeric overflow"),
            KernelError::IndexOutOfRange { index } => {
                write!(f, "block index {} out of range", index)
            }
            KernelError::DuplicatePeer(id) => write!(f, "duplicate peer id {}", id),
            KernelError::ForeignRow { expected, found } => {
                write!(f, "row from peer {} in partition of peer {}", found, expected)
            }
            KernelError::OutsideBlock { seq, block_id } => {
                write!(f, "seq {} is outside block {}", seq, block_id)
            }
            KernelError::Gap { expected, found } => {
                write!(f, "sequence gap: expected {}, found {}", expected, found)
            }
            KernelError::Overlap { seq } => write!(f, "sequence overlap at {}", seq),
            KernelError::Divergent { seq } => {
                write!(f, "row at seq {} differs from the committed copy", seq)
            }
            KernelError::InvalidAmount => write!(f, "invalid amount"),
        }
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
pub type Result<T> = KernelResult<T>;
