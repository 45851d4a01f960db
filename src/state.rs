// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::gateway::RouteTable;

/// Upstream requests give up after this long.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared gateway state.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub http: Client,
}

impl AppState {
    /// `insecure_upstream_tls` disables certificate checks for upstreams.
    pub fn new(routes: RouteTable, insecure_upstream_tls: bool) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .danger_accept_invalid_certs(insecure_upstream_tls)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            routes: Arc::new(routes),
            http,
        })
    }
}
