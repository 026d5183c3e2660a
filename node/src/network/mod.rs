// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Peer-to-peer HTTP plumbing: header names, paths and the transport seam.

use std::time::Duration;

pub mod client;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::submit_entry;
pub use transport::{HttpTransport, PeerTransport, RawResponse, TransportError};

pub const X_FROM: &str = "X-From";
pub const X_PEER_ID: &str = "X-Peer-ID";
pub const X_BLOCK_ID: &str = "X-Block-ID";
pub const X_ACCOUNT: &str = "X-Account";
pub const X_NAME: &str = "X-Name";
pub const X_REMARK: &str = "X-Remark";
pub const X_AMOUNT: &str = "X-Amount";

pub const ONPOLL_PATH: &str = "/onpoll";
pub const ENTER_PATH: &str = "/enter";

/// Fixed per-request deadline for every peer call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
