// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup via [`AppConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SUI_RPC_URL` | Sui fullnode JSON-RPC endpoint | testnet fullnode |
//! | `SEAL_PACKAGE_ID` | Move package holding `subscription` | Required for `watch`/`view` |
//! | `SERVICE_ID` | Subscription service object to follow | Required for `watch`/`view` |
//! | `VIEWER_ADDRESS` | Account whose subscriptions are checked | Required for `watch`/`view` |
//! | `SEAL_BRIDGE_URL` | Seal SDK / wallet bridge | Required for `view` |
//! | `MIRROR_BASE_URL` | Base URL the mirror names are mounted under | `http://127.0.0.1:8080` |
//! | `MIRRORS` | Comma-separated aggregator names | `aggregator1..aggregator6` |
//! | `FEED_POLL_INTERVAL_MS` | Feed poll interval | `3000` |
//! | `KEY_THRESHOLD` | Key servers that must agree | `2` |
//! | `BLOB_FETCH_TIMEOUT_MS` | Per-blob download timeout | `10000` |
//! | `HOST` | Gateway bind address | `0.0.0.0` |
//! | `PORT` | Gateway bind port | `8080` |
//! | `GATEWAY_ROUTES` | `name=url,...` overrides for the gateway table | built-in table |
//! | `GATEWAY_INSECURE_UPSTREAM_TLS` | Skip upstream certificate checks | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use url::Url;

use crate::chain::SUI_TESTNET;

pub const SUI_RPC_URL_ENV: &str = "SUI_RPC_URL";
pub const SEAL_PACKAGE_ID_ENV: &str = "SEAL_PACKAGE_ID";
pub const SERVICE_ID_ENV: &str = "SERVICE_ID";
pub const VIEWER_ADDRESS_ENV: &str = "VIEWER_ADDRESS";
pub const SEAL_BRIDGE_URL_ENV: &str = "SEAL_BRIDGE_URL";
pub const MIRROR_BASE_URL_ENV: &str = "MIRROR_BASE_URL";
pub const MIRRORS_ENV: &str = "MIRRORS";
pub const FEED_POLL_INTERVAL_MS_ENV: &str = "FEED_POLL_INTERVAL_MS";
pub const KEY_THRESHOLD_ENV: &str = "KEY_THRESHOLD";
pub const BLOB_FETCH_TIMEOUT_MS_ENV: &str = "BLOB_FETCH_TIMEOUT_MS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const GATEWAY_ROUTES_ENV: &str = "GATEWAY_ROUTES";
pub const GATEWAY_INSECURE_UPSTREAM_TLS_ENV: &str = "GATEWAY_INSECURE_UPSTREAM_TLS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_MIRROR_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Feed poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Per-blob download timeout.
pub const DEFAULT_BLOB_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Key servers that must agree before a key is released.
pub const DEFAULT_KEY_THRESHOLD: u8 = 2;

/// Aggregators used for blob retrieval.
pub const DEFAULT_MIRRORS: [&str; 6] = [
    "aggregator1",
    "aggregator2",
    "aggregator3",
    "aggregator4",
    "aggregator5",
    "aggregator6",
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sui_rpc_url: Url,
    pub package_id: Option<String>,
    pub service_id: Option<String>,
    pub viewer_address: Option<String>,
    pub bridge_url: Option<Url>,
    pub mirror_base_url: Url,
    pub mirrors: Vec<String>,
    pub poll_interval: Duration,
    pub key_threshold: u8,
    pub blob_fetch_timeout: Duration,
    pub host: String,
    pub port: u16,
    /// `None` means the built-in gateway table.
    pub gateway_routes: Option<Vec<(String, Url)>>,
    pub insecure_upstream_tls: bool,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let sui_rpc_url = parse_url(
            SUI_RPC_URL_ENV,
            &get(SUI_RPC_URL_ENV).unwrap_or_else(|| SUI_TESTNET.rpc_url.to_string()),
        )?;
        let bridge_url = get(SEAL_BRIDGE_URL_ENV)
            .map(|raw| parse_url(SEAL_BRIDGE_URL_ENV, &raw))
            .transpose()?;
        let mirror_base_url = parse_url(
            MIRROR_BASE_URL_ENV,
            &get(MIRROR_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_MIRROR_BASE_URL.to_string()),
        )?;

        let mirrors = match get(MIRRORS_ENV) {
            Some(raw) => {
                let names = split_list(&raw);
                if names.is_empty() {
                    return Err(ConfigError::Invalid {
                        name: MIRRORS_ENV,
                        reason: "at least one mirror is required".to_string(),
                    });
                }
                names
            }
            None => DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect(),
        };

        let poll_interval = get(FEED_POLL_INTERVAL_MS_ENV)
            .map(|raw| parse_millis(FEED_POLL_INTERVAL_MS_ENV, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let blob_fetch_timeout = get(BLOB_FETCH_TIMEOUT_MS_ENV)
            .map(|raw| parse_millis(BLOB_FETCH_TIMEOUT_MS_ENV, &raw))
            .transpose()?
            .unwrap_or(DEFAULT_BLOB_FETCH_TIMEOUT);

        let key_threshold = match get(KEY_THRESHOLD_ENV) {
            Some(raw) => match raw.parse::<u8>() {
                Ok(0) | Err(_) => {
                    return Err(ConfigError::Invalid {
                        name: KEY_THRESHOLD_ENV,
                        reason: format!("expected a positive integer, got `{raw}`"),
                    })
                }
                Ok(t) => t,
            },
            None => DEFAULT_KEY_THRESHOLD,
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let gateway_routes = get(GATEWAY_ROUTES_ENV)
            .map(|raw| parse_routes(&raw))
            .transpose()?;

        let insecure_upstream_tls = match get(GATEWAY_INSECURE_UPSTREAM_TLS_ENV) {
            Some(raw) => parse_bool(GATEWAY_INSECURE_UPSTREAM_TLS_ENV, &raw)?,
            None => true,
        };

        Ok(Self {
            sui_rpc_url,
            package_id: get(SEAL_PACKAGE_ID_ENV),
            service_id: get(SERVICE_ID_ENV),
            viewer_address: get(VIEWER_ADDRESS_ENV),
            bridge_url,
            mirror_base_url,
            mirrors,
            poll_interval,
            key_threshold,
            blob_fetch_timeout,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            gateway_routes,
            insecure_upstream_tls,
        })
    }

    pub fn require_package_id(&self) -> Result<&str, ConfigError> {
        self.package_id
            .as_deref()
            .ok_or(ConfigError::Missing(SEAL_PACKAGE_ID_ENV))
    }

    pub fn require_service_id(&self) -> Result<&str, ConfigError> {
        self.service_id
            .as_deref()
            .ok_or(ConfigError::Missing(SERVICE_ID_ENV))
    }

    pub fn require_viewer_address(&self) -> Result<&str, ConfigError> {
        self.viewer_address
            .as_deref()
            .ok_or(ConfigError::Missing(VIEWER_ADDRESS_ENV))
    }

    pub fn require_bridge_url(&self) -> Result<&Url, ConfigError> {
        self.bridge_url
            .as_ref()
            .ok_or(ConfigError::Missing(SEAL_BRIDGE_URL_ENV))
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_millis(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a positive number of milliseconds, got `{raw}`"),
        }),
        Ok(ms) => Ok(Duration::from_millis(ms)),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_routes(raw: &str) -> Result<Vec<(String, Url)>, ConfigError> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (name, target) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: GATEWAY_ROUTES_ENV,
                reason: format!("expected `name=url`, got `{entry}`"),
            })?;
            let name = name.trim().trim_matches('/').to_string();
            if name.is_empty() {
                return Err(ConfigError::Invalid {
                    name: GATEWAY_ROUTES_ENV,
                    reason: format!("empty route name in `{entry}`"),
                });
            }
            Ok((name, parse_url(GATEWAY_ROUTES_ENV, target.trim())?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.sui_rpc_url.as_str(), "https://fullnode.testnet.sui.io/");
        assert_eq!(config.mirrors.len(), 6);
        assert_eq!(config.mirrors[0], "aggregator1");
        assert_eq!(config.poll_interval, Duration::from_millis(3000));
        assert_eq!(config.blob_fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.key_threshold, 2);
        assert_eq!(config.port, 8080);
        assert!(config.insecure_upstream_tls);
        assert!(config.gateway_routes.is_none());
        assert_eq!(
            config.require_package_id(),
            Err(ConfigError::Missing(SEAL_PACKAGE_ID_ENV))
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AppConfig::from_lookup(lookup(&[
            (SEAL_PACKAGE_ID_ENV, " 0xabc "),
            (MIRRORS_ENV, "aggregator2, aggregator5,"),
            (FEED_POLL_INTERVAL_MS_ENV, "500"),
            (KEY_THRESHOLD_ENV, "3"),
            (GATEWAY_ROUTES_ENV, "aggregator1=http://localhost:9000,/publisher1/=https://p.example"),
            (GATEWAY_INSECURE_UPSTREAM_TLS_ENV, "off"),
        ]))
        .unwrap();

        assert_eq!(config.require_package_id(), Ok("0xabc"));
        assert_eq!(config.mirrors, vec!["aggregator2", "aggregator5"]);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.key_threshold, 3);
        assert!(!config.insecure_upstream_tls);

        let routes = config.gateway_routes.unwrap();
        assert_eq!(routes[0].0, "aggregator1");
        assert_eq!(routes[1].0, "publisher1");
        assert_eq!(routes[1].1.as_str(), "https://p.example/");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[(KEY_THRESHOLD_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == KEY_THRESHOLD_ENV));

        let err = AppConfig::from_lookup(lookup(&[(GATEWAY_ROUTES_ENV, "aggregator1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == GATEWAY_ROUTES_ENV));

        let err = AppConfig::from_lookup(lookup(&[(FEED_POLL_INTERVAL_MS_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
