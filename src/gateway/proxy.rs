// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reverse proxy handler.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Largest request body forwarded upstream (publisher uploads included).
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == header::CONNECTION
        || name == header::PROXY_AUTHENTICATE
        || name == header::PROXY_AUTHORIZATION
        || name == header::TE
        || name == header::TRAILER
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
        || name.as_str() == "keep-alive"
}

/// Copy end-to-end headers, dropping `Host` and `Content-Length`.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| {
            !is_hop_by_hop(name) && *name != header::HOST && *name != header::CONTENT_LENGTH
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Forward `/{name}/v1/...` to the configured upstream.
pub async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path();

    let route = state
        .routes
        .resolve(path, parts.uri.query())
        .ok_or_else(|| ApiError::not_found(format!("no gateway route for {path}")))?;

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::payload_too_large(format!("request body rejected: {e}")))?;

    debug!(route = route.name, method = %parts.method, upstream = %route.upstream, "Proxying request");

    let upstream = state
        .http
        .request(parts.method.clone(), route.upstream.clone())
        .headers(forwardable(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            warn!(route = route.name, upstream = %route.upstream, error = %e, "Upstream request failed");
            ApiError::bad_gateway(format!("upstream {} unavailable", route.name))
        })?;

    let status = upstream.status();
    let headers = forwardable(upstream.headers());
    let bytes = upstream.bytes().await.map_err(|e| {
        warn!(route = route.name, error = %e, "Upstream response body failed");
        ApiError::bad_gateway(format!("upstream {} closed the response", route.name))
    })?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn hop_by_hop_and_host_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let forwarded = forwardable(&headers);
        assert_eq!(forwarded.len(), 2);
        assert!(forwarded.contains_key(header::ACCEPT));
        assert!(forwarded.contains_key("x-request-id"));
    }
}
