// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mirror pool and selection strategies.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use url::Url;

/// One aggregator endpoint. Blobs live under `{endpoint}/v1/blobs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mirror {
    pub name: String,
    pub endpoint: Url,
}

impl Mirror {
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
        }
    }

    /// Retrieval URL for a blob on this mirror.
    pub fn blob_url(&self, blob_id: &str) -> Result<Url, String> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| format!("mirror endpoint `{}` cannot be a base", self.endpoint))?
            .pop_if_empty()
            .extend(["v1", "blobs", blob_id]);
        Ok(url)
    }
}

/// Fixed, non-empty set of mirrors.
#[derive(Debug, Clone)]
pub struct MirrorPool {
    mirrors: Vec<Mirror>,
}

impl MirrorPool {
    pub fn new(mirrors: Vec<Mirror>) -> Result<Self, String> {
        if mirrors.is_empty() {
            return Err("mirror pool must contain at least one mirror".to_string());
        }
        Ok(Self { mirrors })
    }

    /// Mirrors mounted under a gateway, e.g. `http://127.0.0.1:8080/aggregator1`.
    pub fn via_gateway(base: &Url, names: &[String]) -> Result<Self, String> {
        let mirrors = names
            .iter()
            .map(|name| {
                let mut endpoint = base.clone();
                endpoint
                    .path_segments_mut()
                    .map_err(|_| format!("gateway URL `{base}` cannot be a base"))?
                    .pop_if_empty()
                    .push(name);
                Ok(Mirror::new(name.clone(), endpoint))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Self::new(mirrors)
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Mirror at `index`, wrapping out-of-range indices.
    pub fn get(&self, index: usize) -> &Mirror {
        &self.mirrors[index % self.mirrors.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.iter()
    }
}

/// Chooses which mirror serves a download.
pub trait MirrorSelector: Send + Sync {
    /// Index in `0..pool_len`. `pool_len` is never zero.
    fn pick(&self, pool_len: usize) -> usize;
}

/// Uniform random choice per download.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl MirrorSelector for RandomSelector {
    fn pick(&self, pool_len: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_len)
    }
}

/// Cycles through the pool in order.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn starting_at(index: usize) -> Self {
        Self {
            next: AtomicUsize::new(index),
        }
    }
}

impl MirrorSelector for RoundRobinSelector {
    fn pick(&self, pool_len: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % pool_len
    }
}
