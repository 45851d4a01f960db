// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sealed Feed - Subscription-gated encrypted content client
//!
//! This crate follows a Sui subscription service, downloads its
//! Seal-encrypted blobs from Walrus aggregators and decrypts them through
//! the Seal SDK bridge once the viewer holds a valid subscription.
//!
//! ## Modules
//!
//! - `chain` - Sui JSON-RPC reads and transaction descriptions
//! - `feed` - Feed snapshots and the background poller
//! - `session` - Short-lived session keys for key release
//! - `walrus` - Aggregator mirrors and blob downloads
//! - `seal` - Key service seam and encrypted object headers
//! - `retrieval` - Download, key release and decryption pipeline
//! - `viewer` - Viewer state and actions
//! - `bridge` - HTTP client for the Seal SDK / wallet bridge
//! - `gateway` - Development reverse proxy for aggregators and publishers

pub mod bridge;
pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod logging;
pub mod retrieval;
pub mod seal;
pub mod session;
pub mod state;
pub mod viewer;
pub mod walrus;
