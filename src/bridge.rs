// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the Seal SDK / wallet bridge.
//!
//! The bridge is a sidecar hosting the Seal SDK and the connected wallet.
//! It builds transaction bytes, executes transactions, signs personal
//! messages and performs key release and decryption. Byte fields travel as
//! base64 inside JSON bodies.

use std::time::Duration;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::chain::{
    ChainError, ExecutionResult, ProgrammableTransaction, SuiAddress, TransactionExecutor,
    TransactionKindBuilder,
};
use crate::seal::{KeyService, KeyServiceError};
use crate::session::{ExportedSessionKey, PersonalMessageSigner, SessionKey, SignerError};

/// Key release and decryption wait on several key servers.
const BRIDGE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid bridge URL: {0}")]
    InvalidUrl(String),

    #[error("bridge request failed: {0}")]
    Request(String),

    #[error("bridge returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("bridge response was invalid: {0}")]
    InvalidResponse(String),

    #[error("session key is not signed")]
    UnsignedSession,
}

impl BridgeError {
    fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<BridgeError> for ChainError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Status { .. } => ChainError::TransactionFailed(err.to_string()),
            other => ChainError::Rpc(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct TransactionKindRequest<'a> {
    transaction: &'a ProgrammableTransaction,
}

#[derive(Deserialize)]
struct BytesResponse {
    bytes: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    sender: Option<&'a str>,
    transaction: &'a ProgrammableTransaction,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    address: &'a str,
    message: String,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: String,
}

#[derive(Serialize)]
struct FetchKeysRequest {
    ids: Vec<String>,
    tx_bytes: String,
    session_key: ExportedSessionKey,
    threshold: u8,
}

#[derive(Serialize)]
struct DecryptRequest {
    data: String,
    tx_bytes: String,
    session_key: ExportedSessionKey,
}

/// Client for the bridge sidecar.
#[derive(Debug, Clone)]
pub struct SealBridgeClient {
    base_url: Url,
    http: Client,
}

impl SealBridgeClient {
    pub fn new(base_url: Url) -> Result<Self, BridgeError> {
        if base_url.cannot_be_a_base() {
            return Err(BridgeError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder()
            .timeout(BRIDGE_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BridgeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BridgeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> Result<reqwest::Response, BridgeError> {
        let url = self.endpoint(path)?;
        debug!(%url, "Calling seal bridge");

        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::Request(format!("{path}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
            .unwrap_or(text);
        Err(BridgeError::Status { status, message })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, BridgeError> {
        self.post(path, body)
            .await?
            .json()
            .await
            .map_err(|e| BridgeError::InvalidResponse(format!("{path}: {e}")))
    }
}

fn export(session: &SessionKey) -> Result<ExportedSessionKey, BridgeError> {
    session.export().map_err(|_| BridgeError::UnsignedSession)
}

fn key_service_error(err: BridgeError) -> KeyServiceError {
    if err.status() == Some(StatusCode::FORBIDDEN) {
        KeyServiceError::NoAccess(err.to_string())
    } else {
        KeyServiceError::Failure(err.to_string())
    }
}

#[async_trait]
impl TransactionKindBuilder for SealBridgeClient {
    async fn build_kind(&self, tx: &ProgrammableTransaction) -> Result<Vec<u8>, ChainError> {
        let response: BytesResponse = self
            .post_json("v1/transaction-kind", &TransactionKindRequest { transaction: tx })
            .await?;
        Base64::decode_vec(&response.bytes)
            .map_err(|e| ChainError::InvalidResponse(format!("transaction bytes: {e}")))
    }
}

#[async_trait]
impl TransactionExecutor for SealBridgeClient {
    async fn execute(&self, tx: &ProgrammableTransaction) -> Result<ExecutionResult, ChainError> {
        let request = ExecuteRequest {
            sender: tx.sender.as_deref(),
            transaction: tx,
        };
        Ok(self.post_json("v1/transactions/execute", &request).await?)
    }
}

#[async_trait]
impl PersonalMessageSigner for SealBridgeClient {
    async fn sign_personal_message(
        &self,
        address: &SuiAddress,
        message: &[u8],
    ) -> Result<String, SignerError> {
        let request = SignRequest {
            address: address.as_str(),
            message: Base64::encode_string(message),
        };
        match self
            .post_json::<SignResponse>("v1/sign-personal-message", &request)
            .await
        {
            Ok(response) => Ok(response.signature),
            Err(e) if e.status().is_some_and(|s| s.is_client_error()) => {
                Err(SignerError::Declined(e.to_string()))
            }
            Err(e) => Err(SignerError::Failed(e.to_string())),
        }
    }
}

#[async_trait]
impl KeyService for SealBridgeClient {
    async fn fetch_keys(
        &self,
        ids: &[Vec<u8>],
        tx_bytes: &[u8],
        session: &SessionKey,
        threshold: u8,
    ) -> Result<(), KeyServiceError> {
        let request = FetchKeysRequest {
            ids: ids.iter().map(hex::encode).collect(),
            tx_bytes: Base64::encode_string(tx_bytes),
            session_key: export(session).map_err(|e| KeyServiceError::Failure(e.to_string()))?,
            threshold,
        };
        self.post("v1/fetch-keys", &request)
            .await
            .map(|_| ())
            .map_err(key_service_error)
    }

    async fn decrypt(
        &self,
        data: &[u8],
        session: &SessionKey,
        tx_bytes: &[u8],
    ) -> Result<Vec<u8>, KeyServiceError> {
        let request = DecryptRequest {
            data: Base64::encode_string(data),
            tx_bytes: Base64::encode_string(tx_bytes),
            session_key: export(session).map_err(|e| KeyServiceError::Failure(e.to_string()))?,
        };
        let response = self
            .post("v1/decrypt", &request)
            .await
            .map_err(key_service_error)?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| KeyServiceError::Failure(format!("decrypt response: {e}")))?;
        Ok(bytes.to_vec())
    }
}
