// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Keys
//!
//! A session key is a short-lived, address-scoped credential that lets the
//! viewer request decryption keys without a wallet prompt per request. The
//! wallet signs a personal message once; the signed key is then reused until
//! it expires.
//!
//! ## Reuse rules
//!
//! - The cached key must belong to the requesting address
//! - The key must not be expired (`now >= creation + ttl` is expired)
//!
//! ## Single flight
//!
//! Keys are cached per address behind an async slot lock. Concurrent callers
//! for the same address queue on the slot, so only one signing prompt is
//! ever outstanding per address. The LRU bounds how many idle slots are
//! kept; a slot somebody still holds stays reachable after eviction.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ed25519_dalek::SigningKey;
use lru::LruCache;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chain::SuiAddress;

/// Validity window of a session key, in minutes.
pub const SESSION_KEY_TTL_MIN: u16 = 10;

/// Addresses with a cached session key.
const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Errors raised while obtaining a session key.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The user declined the signature request.
    #[error("signing declined: {0}")]
    SigningDeclined(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("session key has no personal message signature")]
    Unsigned,
}

/// Failure reported by the wallet signer.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("declined: {0}")]
    Declined(String),

    #[error("{0}")]
    Failed(String),
}

/// Wallet capability: sign a personal message for an address.
#[async_trait]
pub trait PersonalMessageSigner: Send + Sync {
    /// Returns the serialized wallet signature.
    async fn sign_personal_message(
        &self,
        address: &SuiAddress,
        message: &[u8],
    ) -> Result<String, SignerError>;
}

/// Time-boxed credential for key-server requests.
#[derive(Clone)]
pub struct SessionKey {
    address: SuiAddress,
    package_id: String,
    creation_time: DateTime<Utc>,
    ttl_min: u16,
    session_key: SigningKey,
    personal_message_signature: Option<String>,
}

/// Serializable form handed to the Seal SDK.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExportedSessionKey {
    pub address: String,
    pub package_id: String,
    pub creation_time_ms: i64,
    pub ttl_min: u16,
    pub session_key: String,
    pub personal_message_signature: String,
}

impl SessionKey {
    /// Create an unsigned key with a fresh ephemeral keypair.
    pub fn new(address: SuiAddress, package_id: impl Into<String>, ttl_min: u16) -> Self {
        Self::new_at(address, package_id, ttl_min, Utc::now())
    }

    pub fn new_at(
        address: SuiAddress,
        package_id: impl Into<String>,
        ttl_min: u16,
        creation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            address,
            package_id: package_id.into(),
            creation_time,
            ttl_min,
            session_key: SigningKey::generate(&mut rand::rngs::OsRng),
            personal_message_signature: None,
        }
    }

    pub fn address(&self) -> &SuiAddress {
        &self.address
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.creation_time + ChronoDuration::minutes(i64::from(self.ttl_min))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Raw Ed25519 public key of the ephemeral session keypair.
    pub fn session_public_key(&self) -> [u8; 32] {
        self.session_key.verifying_key().to_bytes()
    }

    /// The message the wallet signs to bind this key to its address.
    pub fn personal_message(&self) -> Vec<u8> {
        format!(
            "Accessing keys of package {} for {} mins from {} UTC, session key {}",
            self.package_id,
            self.ttl_min,
            self.creation_time.format("%Y-%m-%d %H:%M:%S"),
            Base64::encode_string(&self.session_public_key()),
        )
        .into_bytes()
    }

    pub fn set_personal_message_signature(&mut self, signature: impl Into<String>) {
        self.personal_message_signature = Some(signature.into());
    }

    pub fn is_signed(&self) -> bool {
        self.personal_message_signature.is_some()
    }

    /// Usable by `address` at `now`.
    pub fn is_usable_by(&self, address: &SuiAddress, now: DateTime<Utc>) -> bool {
        self.is_signed() && &self.address == address && !self.is_expired_at(now)
    }

    pub fn export(&self) -> Result<ExportedSessionKey, SessionError> {
        let signature = self
            .personal_message_signature
            .clone()
            .ok_or(SessionError::Unsigned)?;
        Ok(ExportedSessionKey {
            address: self.address.to_string(),
            package_id: self.package_id.clone(),
            creation_time_ms: self.creation_time.timestamp_millis(),
            ttl_min: self.ttl_min,
            session_key: Base64::encode_string(self.session_key.as_bytes()),
            personal_message_signature: signature,
        })
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("address", &self.address)
            .field("package_id", &self.package_id)
            .field("creation_time", &self.creation_time)
            .field("ttl_min", &self.ttl_min)
            .field("signed", &self.is_signed())
            .finish_non_exhaustive()
    }
}

type SlotLock = tokio::sync::Mutex<Option<SessionKey>>;
type Slot = Arc<SlotLock>;

#[derive(Debug)]
struct Slots {
    /// Every slot that is still referenced, cached or in use.
    live: HashMap<SuiAddress, Weak<SlotLock>>,
    /// Recently used slots kept alive between calls.
    cached: LruCache<SuiAddress, Slot>,
}

/// Issues and caches session keys per address.
pub struct SessionKeyManager {
    package_id: String,
    ttl_min: u16,
    signer: Arc<dyn PersonalMessageSigner>,
    slots: Mutex<Slots>,
}

impl SessionKeyManager {
    pub fn new(package_id: impl Into<String>, signer: Arc<dyn PersonalMessageSigner>) -> Self {
        Self::with_capacity(package_id, signer, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(
        package_id: impl Into<String>,
        signer: Arc<dyn PersonalMessageSigner>,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            package_id: package_id.into(),
            ttl_min: SESSION_KEY_TTL_MIN,
            signer,
            slots: Mutex::new(Slots {
                live: HashMap::new(),
                cached: LruCache::new(capacity),
            }),
        }
    }

    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Return a usable session key for `address`, signing a new one if needed.
    pub async fn ensure_session_key(&self, address: &str) -> Result<SessionKey, SessionError> {
        self.ensure_session_key_at(address, Utc::now()).await
    }

    /// [`Self::ensure_session_key`] evaluated at an explicit instant.
    pub async fn ensure_session_key_at(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionKey, SessionError> {
        let address = SuiAddress::parse(address).map_err(SessionError::InvalidAddress)?;
        let slot = self.slot(&address);
        let mut held = slot.lock().await;

        if let Some(key) = held.as_ref() {
            if key.is_usable_by(&address, now) {
                debug!(address = %address, expires_at = %key.expires_at(), "Reusing session key");
                return Ok(key.clone());
            }
        }
        *held = None;

        let mut key = SessionKey::new_at(address.clone(), self.package_id.clone(), self.ttl_min, now);
        let message = key.personal_message();

        match self.signer.sign_personal_message(&address, &message).await {
            Ok(signature) => {
                key.set_personal_message_signature(signature);
                info!(address = %address, expires_at = %key.expires_at(), "Issued session key");
                *held = Some(key.clone());
                Ok(key)
            }
            Err(SignerError::Declined(reason)) => {
                warn!(address = %address, reason = %reason, "Session key signing declined");
                Err(SessionError::SigningDeclined(reason))
            }
            Err(SignerError::Failed(reason)) => {
                warn!(address = %address, reason = %reason, "Session key signing failed");
                Err(SessionError::Signing(reason))
            }
        }
    }

    /// Drop any cached key for `address`.
    ///
    /// Waits for an in-flight signature for the same address to finish.
    pub async fn invalidate(&self, address: &str) {
        let Ok(address) = SuiAddress::parse(address) else {
            return;
        };
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.live.get(&address).and_then(Weak::upgrade)
        };
        if let Some(slot) = slot {
            *slot.lock().await = None;
            debug!(address = %address, "Session key invalidated");
        }
    }

    fn slot(&self, address: &SuiAddress) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = slots.live.get(address).and_then(Weak::upgrade) {
            slots.cached.put(address.clone(), slot.clone());
            return slot;
        }

        slots.live.retain(|_, slot| slot.strong_count() > 0);
        let slot: Slot = Arc::new(tokio::sync::Mutex::new(None));
        slots.live.insert(address.clone(), Arc::downgrade(&slot));
        slots.cached.put(address.clone(), slot.clone());
        slot
    }
}
