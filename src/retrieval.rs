// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Retrieval and Decryption
//!
//! Turns a list of blob ids into decrypted artifacts:
//!
//! 1. Download every blob concurrently from the mirror pool
//! 2. Drop failed downloads; abort if none succeeded
//! 3. Release keys in batches of at most [`MAX_KEY_BATCH`] ids
//! 4. Decrypt each object in order
//! 5. Hand back artifacts only once every object decrypted
//!
//! Per-blob download failures are counted and reported as one notice. Any
//! other failure aborts the run with exactly one error.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{ApprovalConstructor, ChainError, ProgrammableTransaction, TransactionKindBuilder};
use crate::config::DEFAULT_KEY_THRESHOLD;
use crate::seal::{
    parse_encrypted_object, EncryptedObject, KeyService, KeyServiceError, ParseError,
    MAX_KEY_BATCH,
};
use crate::session::SessionKey;
use crate::walrus::AggregatorClient;

pub const TOTAL_UNAVAILABILITY_MESSAGE: &str =
    "No files could be downloaded from the Walrus aggregators. Please try again.";
pub const ACCESS_DENIED_MESSAGE: &str = "No access to decryption keys";
pub const DECRYPT_FAILURE_MESSAGE: &str = "Unable to decrypt files, please try again";
pub const GENERIC_FAILURE_MESSAGE: &str =
    "An error occurred while downloading or decrypting files.";

/// Notice shown when only part of the feed could be downloaded.
pub fn partial_notice(succeeded: usize, requested: usize) -> String {
    format!(
        "Showing {succeeded} of {requested} files. The rest were not stored long enough on Walrus, please upload them again."
    )
}

/// Errors that abort a retrieval run.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("none of the {requested} requested blobs could be downloaded")]
    TotalUnavailability { requested: usize },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("key release failed: {0}")]
    KeyRelease(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("malformed encrypted object {blob_id}: {source}")]
    MalformedObject {
        blob_id: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to build authorization transaction: {0}")]
    Transaction(#[from] ChainError),
}

impl RetrievalError {
    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TotalUnavailability { .. } => TOTAL_UNAVAILABILITY_MESSAGE,
            Self::AccessDenied(_) => ACCESS_DENIED_MESSAGE,
            Self::KeyRelease(_) | Self::Decryption(_) => DECRYPT_FAILURE_MESSAGE,
            Self::MalformedObject { .. } | Self::Transaction(_) => GENERIC_FAILURE_MESSAGE,
        }
    }

    fn from_key_release(err: KeyServiceError) -> Self {
        match err {
            KeyServiceError::NoAccess(msg) => Self::AccessDenied(msg),
            KeyServiceError::Failure(msg) => Self::KeyRelease(msg),
        }
    }

    fn from_decrypt(err: KeyServiceError) -> Self {
        match err {
            KeyServiceError::NoAccess(msg) => Self::AccessDenied(msg),
            KeyServiceError::Failure(msg) => Self::Decryption(msg),
        }
    }
}

/// One decrypted file, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedArtifact {
    pub id: Uuid,
    /// Position among the successfully downloaded blobs.
    pub index: usize,
    pub blob_id: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl DecryptedArtifact {
    fn new(index: usize, blob_id: String, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            blob_id,
            content_type: sniff_content_type(&bytes),
            bytes,
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self.content_type {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

/// Content type from leading magic bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = &[0xff, 0xd8, 0xff];

    if bytes.starts_with(PNG) {
        "image/png"
    } else if bytes.starts_with(JPEG) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub artifacts: Vec<DecryptedArtifact>,
    /// Set when some, but not all, downloads failed.
    pub partial_notice: Option<String>,
    pub requested: usize,
    pub failed: usize,
}

/// A downloaded blob with its decoded object.
struct EncryptedBlob {
    blob_id: String,
    object: EncryptedObject,
    data: Vec<u8>,
}

/// Download, authorize and decrypt a feed's blobs.
#[derive(Clone)]
pub struct RetrievalPipeline {
    aggregators: AggregatorClient,
    keys: Arc<dyn KeyService>,
    tx_builder: Arc<dyn TransactionKindBuilder>,
    threshold: u8,
}

impl RetrievalPipeline {
    pub fn new(
        aggregators: AggregatorClient,
        keys: Arc<dyn KeyService>,
        tx_builder: Arc<dyn TransactionKindBuilder>,
    ) -> Self {
        Self {
            aggregators,
            keys,
            tx_builder,
            threshold: DEFAULT_KEY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub async fn download_and_decrypt(
        &self,
        blob_ids: &[String],
        session: &SessionKey,
        approval: &dyn ApprovalConstructor,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        let requested = blob_ids.len();
        info!(requested, "Starting retrieval");

        let downloads = self.aggregators.download_all(blob_ids).await;
        let fetched: Vec<(String, Vec<u8>)> = downloads
            .into_iter()
            .filter_map(|d| d.result.ok().map(|bytes| (d.blob_id, bytes)))
            .collect();

        let failed = requested - fetched.len();
        if fetched.is_empty() {
            warn!(requested, "No blobs could be downloaded");
            return Err(RetrievalError::TotalUnavailability { requested });
        }
        let partial_notice = (failed > 0).then(|| {
            warn!(requested, failed, "Continuing with partial download");
            partial_notice(fetched.len(), requested)
        });

        let blobs = fetched
            .into_iter()
            .map(|(blob_id, data)| match parse_encrypted_object(&data) {
                Ok(object) => Ok(EncryptedBlob {
                    blob_id,
                    object,
                    data,
                }),
                Err(source) => Err(RetrievalError::MalformedObject { blob_id, source }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (batch, chunk) in blobs.chunks(MAX_KEY_BATCH).enumerate() {
            let mut tx = ProgrammableTransaction::new();
            let ids: Vec<Vec<u8>> = chunk
                .iter()
                .map(|blob| {
                    approval.add_approval(&mut tx, &blob.object.id);
                    blob.object.id.clone()
                })
                .collect();
            let tx_bytes = self.tx_builder.build_kind(&tx).await?;

            debug!(batch, ids = ids.len(), "Requesting key release");
            self.keys
                .fetch_keys(&ids, &tx_bytes, session, self.threshold)
                .await
                .map_err(|e| {
                    warn!(batch, error = %e, "Key release failed");
                    RetrievalError::from_key_release(e)
                })?;
        }

        let mut plaintexts = Vec::with_capacity(blobs.len());
        for blob in &blobs {
            let mut tx = ProgrammableTransaction::new();
            approval.add_approval(&mut tx, &blob.object.id);
            let tx_bytes = self.tx_builder.build_kind(&tx).await?;

            let plaintext = self
                .keys
                .decrypt(&blob.data, session, &tx_bytes)
                .await
                .map_err(|e| {
                    warn!(blob_id = %blob.blob_id, error = %e, "Decryption failed");
                    RetrievalError::from_decrypt(e)
                })?;
            plaintexts.push(plaintext);
        }

        let artifacts: Vec<DecryptedArtifact> = blobs
            .into_iter()
            .zip(plaintexts)
            .enumerate()
            .map(|(index, (blob, bytes))| DecryptedArtifact::new(index, blob.blob_id, bytes))
            .collect();

        info!(artifacts = artifacts.len(), requested, failed, "Retrieval complete");
        Ok(RetrievalOutcome {
            artifacts,
            partial_notice,
            requested,
            failed,
        })
    }
}
