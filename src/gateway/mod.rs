// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Aggregator Gateway
//!
//! Development reverse proxy in front of the Walrus aggregators and
//! publishers. A request to `/{name}/v1/...` is forwarded to the upstream
//! registered under `name` with the `/{name}` prefix stripped, so clients
//! can address every mirror through one origin.

use axum::{routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{error::ErrorBody, state::AppState};

pub mod health;
pub mod proxy;
pub mod routes;

pub use routes::{ResolvedRoute, RouteTable, DEFAULT_ROUTES};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(proxy::proxy)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(health::health, health::liveness, health::readiness),
    components(schemas(
        health::ReadyResponse,
        health::HealthChecks,
        health::HealthResponse,
        ErrorBody
    )),
    tags(
        (name = "Health", description = "Gateway health probes")
    )
)]
struct ApiDoc;
