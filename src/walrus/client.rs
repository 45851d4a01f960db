// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blob downloads with per-request timeouts and parallel fan-out.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use tracing::{debug, warn};

use super::mirrors::{MirrorPool, MirrorSelector, RandomSelector};
use crate::config::DEFAULT_BLOB_FETCH_TIMEOUT;

/// Download failure for a single blob.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("timed out fetching blob {blob_id} from {mirror}")]
    Timeout { blob_id: String, mirror: String },

    #[error("HTTP {status} fetching blob {blob_id} from {mirror}")]
    Status {
        blob_id: String,
        mirror: String,
        status: u16,
    },

    #[error("request for blob {blob_id} failed: {message}")]
    Http { blob_id: String, message: String },
}

/// Result of one download attempt, tagged with the mirror that served it.
#[derive(Debug)]
pub struct BlobDownload {
    pub blob_id: String,
    pub mirror: String,
    pub result: Result<Vec<u8>, DownloadError>,
}

impl BlobDownload {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregator client reading blobs from a mirror pool.
#[derive(Clone)]
pub struct AggregatorClient {
    http: Client,
    pool: MirrorPool,
    selector: Arc<dyn MirrorSelector>,
    timeout: Duration,
}

impl AggregatorClient {
    /// Client with uniform random mirror choice and the default timeout.
    pub fn new(pool: MirrorPool) -> Self {
        Self {
            http: Client::new(),
            pool,
            selector: Arc::new(RandomSelector),
            timeout: DEFAULT_BLOB_FETCH_TIMEOUT,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn MirrorSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn pool(&self) -> &MirrorPool {
        &self.pool
    }

    /// Fetch one blob from a freshly selected mirror.
    pub async fn download_blob(&self, blob_id: &str) -> BlobDownload {
        let mirror = self.pool.get(self.selector.pick(self.pool.len()));
        let mirror_name = mirror.name.clone();

        let result = match mirror.blob_url(blob_id) {
            Ok(url) => {
                debug!(blob_id, mirror = %mirror_name, %url, "Fetching blob");
                match tokio::time::timeout(self.timeout, self.fetch(url, blob_id, &mirror_name)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(DownloadError::Timeout {
                        blob_id: blob_id.to_string(),
                        mirror: mirror_name.clone(),
                    }),
                }
            }
            Err(message) => Err(DownloadError::Http {
                blob_id: blob_id.to_string(),
                message,
            }),
        };

        if let Err(e) = &result {
            warn!(blob_id, mirror = %mirror_name, error = %e, "Blob download failed");
        }

        BlobDownload {
            blob_id: blob_id.to_string(),
            mirror: mirror_name,
            result,
        }
    }

    /// Fetch every blob concurrently. Output order matches `blob_ids`.
    ///
    /// A failed or timed-out download never cancels its siblings.
    pub async fn download_all(&self, blob_ids: &[String]) -> Vec<BlobDownload> {
        join_all(blob_ids.iter().map(|id| self.download_blob(id))).await
    }

    async fn fetch(
        &self,
        url: url::Url,
        blob_id: &str,
        mirror: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let http_error = |e: reqwest::Error| DownloadError::Http {
            blob_id: blob_id.to_string(),
            message: e.to_string(),
        };

        let response = self.http.get(url).send().await.map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                blob_id: blob_id.to_string(),
                mirror: mirror.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        Ok(bytes.to_vec())
    }
}
