// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Seal key release and decryption seam.
//!
//! The threshold key-server protocol and the decryption itself live in the
//! Seal SDK. This module only defines the interface the pipeline talks to
//! and decodes encrypted objects.
//!
//! ## Encrypted objects
//!
//! Seal ciphertexts are BCS-encoded [`EncryptedObject`]s. Only `version`
//! 0 is known. The inner `id` authorizes key release.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::ADDRESS_LENGTH;
use crate::session::SessionKey;

/// Maximum ids authorized by a single key-release request.
pub const MAX_KEY_BATCH: usize = 10;

/// Only known encrypted object version.
pub const ENCRYPTED_OBJECT_VERSION: u8 = 0;

/// Failure reported by the key-server SDK.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum KeyServiceError {
    /// The session key / policy does not grant access to the requested ids.
    #[error("no access to decryption keys: {0}")]
    NoAccess(String),

    /// Transport errors, unavailable key servers, malformed data.
    #[error("key service failure: {0}")]
    Failure(String),
}

impl KeyServiceError {
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::NoAccess(_))
    }
}

/// Threshold key release and decryption, provided by the Seal SDK.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Fetch and cache keys for `ids`, authorized by `tx_bytes`, from at
    /// least `threshold` key servers.
    async fn fetch_keys(
        &self,
        ids: &[Vec<u8>],
        tx_bytes: &[u8],
        session: &SessionKey,
        threshold: u8,
    ) -> Result<(), KeyServiceError>;

    /// Decrypt one encrypted object with previously fetched keys.
    async fn decrypt(
        &self,
        data: &[u8],
        session: &SessionKey,
        tx_bytes: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError>;
}

/// Seal encrypted object as stored in Walrus.
///
/// Field order and enum variant order follow the SDK's BCS layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    pub version: u8,
    pub package_id: [u8; ADDRESS_LENGTH],
    pub id: Vec<u8>,
    /// Key server object id and the index of the share it holds.
    pub services: Vec<([u8; ADDRESS_LENGTH], u8)>,
    pub threshold: u8,
    pub encrypted_shares: IbeEncryptions,
    pub ciphertext: Ciphertext,
}

/// Compressed BLS12-381 G2 point (96 bytes, no length prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct G2Bytes(pub [u8; 32], pub [u8; 32], pub [u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbeEncryptions {
    BonehFranklinBls12381 {
        nonce: G2Bytes,
        encrypted_shares: Vec<[u8; 32]>,
        encrypted_randomness: [u8; 32],
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ciphertext {
    Aes256Gcm {
        blob: Vec<u8>,
        aad: Option<Vec<u8>>,
    },
    Hmac256Ctr {
        blob: Vec<u8>,
        aad: Option<Vec<u8>>,
        mac: [u8; 32],
    },
    Plain,
}

impl Ciphertext {
    /// Encrypted payload, if the object carries one.
    pub fn blob(&self) -> Option<&[u8]> {
        match self {
            Self::Aes256Gcm { blob, .. } | Self::Hmac256Ctr { blob, .. } => Some(blob.as_slice()),
            Self::Plain => None,
        }
    }
}

impl EncryptedObject {
    /// Hex form of the inner id, as used by the SDK.
    pub fn id_hex(&self) -> String {
        hex::encode(&self.id)
    }

    pub fn package_id_hex(&self) -> String {
        format!("0x{}", hex::encode(self.package_id))
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported encrypted object version {0}")]
    UnsupportedVersion(u8),

    #[error("malformed encrypted object: {0}")]
    Malformed(String),
}

/// Decode a Seal encrypted object. The whole buffer must be consumed.
pub fn parse_encrypted_object(data: &[u8]) -> Result<EncryptedObject, ParseError> {
    if let Some(&version) = data.first() {
        if version != ENCRYPTED_OBJECT_VERSION {
            return Err(ParseError::UnsupportedVersion(version));
        }
    }
    bcs::from_bytes(data).map_err(|e| ParseError::Malformed(e.to_string()))
}
