// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! ledger-kernel: sequence addressing, row types and replication checks for a
//! peer-partitioned append-only ledger. No I/O lives here.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod types;
pub mod seq;
pub mod peer;
pub mod verify;

#[cfg(test)]
pub mod tests;
