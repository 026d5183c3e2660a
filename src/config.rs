// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Number of sequence numbers held by one block of a peer's partition.
pub const BLOCK_CAPACITY: u64 = 1000;

/// Fractional digits carried by [`crate::types::amount::Amount`].
pub const AMOUNT_FRAC_DIGITS: u32 = 2;

/// Scaling factor between an amount's minor units and whole units.
pub const AMOUNT_SCALE: i64 = 100;
