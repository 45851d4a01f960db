// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sui JSON-RPC client for chain reads.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::*;

/// Page size requested for paginated reads.
const PAGE_LIMIT: u32 = 50;

/// Listings longer than this are rejected rather than truncated.
const MAX_PAGES: usize = 200;

/// Read-only view of chain state used by the feed poller.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetch one object with its Move content.
    async fn get_object(&self, id: &str) -> Result<ObjectData, ChainError>;

    /// All objects of `struct_type` owned by `owner`, across every page.
    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> Result<Vec<ObjectData>, ChainError>;

    /// All dynamic fields under `parent_id`, across every page.
    async fn get_dynamic_fields(&self, parent_id: &str) -> Result<Vec<DynamicFieldInfo>, ChainError>;
}

/// Sui fullnode client.
#[derive(Debug, Clone)]
pub struct SuiClient {
    rpc_url: url::Url,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl SuiClient {
    /// Create a new client for the given fullnode URL.
    pub fn new(rpc_url: url::Url) -> Result<Self, ChainError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ChainError::Rpc(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { rpc_url, http })
    }

    /// Create a client for Sui testnet.
    pub fn testnet() -> Result<Self, ChainError> {
        let url = SUI_TESTNET
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;
        Self::new(url)
    }

    pub fn rpc_url(&self) -> &url::Url {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method}: {e}")))?;

        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "{method}: HTTP {} from fullnode",
                response.status()
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(err) = envelope.error {
            return Err(ChainError::Rpc(format!(
                "{method}: {} (code {})",
                err.message, err.code
            )));
        }

        let result = envelope
            .result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method}: missing result")))?;

        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("{method}: {e}")))
    }

    /// Follow `nextCursor` until the listing is exhausted.
    async fn collect_pages<T, F>(&self, method: &str, params_for: F) -> Result<Vec<T>, ChainError>
    where
        T: DeserializeOwned,
        F: Fn(Option<Value>) -> Value,
    {
        let mut items = Vec::new();
        let mut cursor: Option<Value> = None;

        for _ in 0..MAX_PAGES {
            let page: Page<T> = self.call(method, params_for(cursor.take())).await?;
            items.extend(page.data);

            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) if !next.is_null() => cursor = Some(next),
                _ => return Ok(items),
            }
        }

        tracing::warn!(method, pages = MAX_PAGES, "Listing still incomplete at page limit");
        Err(ChainError::InvalidResponse(format!(
            "{method}: listing exceeds {MAX_PAGES} pages"
        )))
    }
}

#[async_trait]
impl ChainReader for SuiClient {
    async fn get_object(&self, id: &str) -> Result<ObjectData, ChainError> {
        let response: ObjectResponse = self
            .call(
                "sui_getObject",
                json!([id, { "showContent": true, "showType": true }]),
            )
            .await?;

        match (response.data, response.error) {
            (Some(data), _) => Ok(data),
            (None, Some(err)) => Err(ChainError::ObjectNotFound(format!("{id}: {err}"))),
            (None, None) => Err(ChainError::ObjectNotFound(id.to_string())),
        }
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> Result<Vec<ObjectData>, ChainError> {
        let entries: Vec<ObjectResponse> = self
            .collect_pages("suix_getOwnedObjects", |cursor| {
                json!([
                    owner,
                    {
                        "filter": { "StructType": struct_type },
                        "options": { "showContent": true, "showType": true }
                    },
                    cursor,
                    PAGE_LIMIT
                ])
            })
            .await?;

        Ok(entries.into_iter().filter_map(|entry| entry.data).collect())
    }

    async fn get_dynamic_fields(&self, parent_id: &str) -> Result<Vec<DynamicFieldInfo>, ChainError> {
        self.collect_pages("suix_getDynamicFields", |cursor| {
            json!([parent_id, cursor, PAGE_LIMIT])
        })
        .await
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<Value>>>;

    /// Fake fullnode: answers from the request body, records every call.
    async fn rpc(State(calls): State<Calls>, Json(body): Json<Value>) -> Json<Value> {
        calls.lock().unwrap().push(body.clone());
        let method = body["method"].as_str().unwrap_or_default();
        let params = &body["params"];

        let result = match method {
            "sui_getObject" if params[0] == "0xmissing" => {
                json!({ "error": { "code": "notExists", "object_id": "0xmissing" } })
            }
            "sui_getObject" => json!({
                "data": {
                    "objectId": params[0],
                    "content": { "dataType": "moveObject", "fields": { "timestamp_ms": "42" } }
                }
            }),
            "suix_getDynamicFields" if params[0] == "0xendless" => json!({
                "data": [ { "name": { "type": "0x1::string::String", "value": "blob" } } ],
                "nextCursor": "again",
                "hasNextPage": true
            }),
            "suix_getDynamicFields" if params[1].is_null() => json!({
                "data": [
                    { "name": { "type": "0x1::string::String", "value": "blob-a" } },
                    { "name": { "type": "0x1::string::String", "value": "blob-b" } }
                ],
                "nextCursor": "page-2",
                "hasNextPage": true
            }),
            "suix_getDynamicFields" => json!({
                "data": [ { "name": { "type": "0x1::string::String", "value": "blob-c" } } ],
                "nextCursor": null,
                "hasNextPage": false
            }),
            "suix_getOwnedObjects" => json!({
                "data": [
                    { "data": { "objectId": "0xsub" } },
                    { "error": { "code": "deleted" } }
                ],
                "hasNextPage": false
            }),
            _ => {
                return Json(json!({
                    "jsonrpc": "2.0", "id": 1,
                    "error": { "code": -32601, "message": "Method not found" }
                }))
            }
        };

        Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    async fn spawn_fullnode() -> (SuiClient, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route("/", post(rpc)).with_state(calls.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = SuiClient::new(format!("http://{addr}/").parse().unwrap()).unwrap();
        (client, calls)
    }

    #[tokio::test]
    async fn dynamic_fields_follow_every_page() {
        let (client, calls) = spawn_fullnode().await;

        let fields = client.get_dynamic_fields("0xservice").await.unwrap();
        let names: Vec<String> = fields.iter().map(|f| f.name.value_string()).collect();
        assert_eq!(names, vec!["blob-a", "blob-b", "blob-c"]);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1]["params"][1], "page-2");
    }

    #[tokio::test]
    async fn endless_listing_is_an_error_not_a_truncated_feed() {
        let (client, calls) = spawn_fullnode().await;

        let err = client.get_dynamic_fields("0xendless").await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidResponse(ref msg) if msg.contains("exceeds")));
        assert_eq!(calls.lock().unwrap().len(), MAX_PAGES);
    }

    #[tokio::test]
    async fn owned_objects_skip_error_entries() {
        let (client, calls) = spawn_fullnode().await;

        let owned = client
            .get_owned_objects("0xviewer", "0xpkg::subscription::Subscription")
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].object_id, "0xsub");

        let calls = calls.lock().unwrap();
        assert_eq!(
            calls[0]["params"][1]["filter"]["StructType"],
            "0xpkg::subscription::Subscription"
        );
    }

    #[tokio::test]
    async fn get_object_reports_missing_objects() {
        let (client, _) = spawn_fullnode().await;

        let clock = client.get_object(CLOCK_OBJECT_ID).await.unwrap();
        assert_eq!(clock.fields()["timestamp_ms"], "42");

        let err = client.get_object("0xmissing").await.unwrap_err();
        assert!(matches!(err, ChainError::ObjectNotFound(_)));
    }

    #[test]
    fn testnet_client_uses_public_fullnode() {
        let client = SuiClient::testnet().unwrap();
        assert_eq!(client.rpc_url().host_str(), Some("fullnode.testnet.sui.io"));
    }
}
