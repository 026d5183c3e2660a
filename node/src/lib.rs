// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod telemetry;
pub mod network;
pub mod store;
pub mod ledger;
pub mod connection;
pub mod replication;
pub mod server;
