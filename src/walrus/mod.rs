// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Walrus aggregator access.
//!
//! Blobs are read from one of several independently operated aggregators
//! ("mirrors"). Each download picks its mirror through a [`MirrorSelector`]
//! so the choice can be made deterministic in tests.

pub mod client;
pub mod mirrors;

pub use client::{AggregatorClient, BlobDownload, DownloadError};
pub use mirrors::{Mirror, MirrorPool, MirrorSelector, RandomSelector, RoundRobinSelector};
