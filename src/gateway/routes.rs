// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway route table.

use std::collections::BTreeMap;

use url::Url;

/// Only paths under this segment are forwarded.
pub const API_PREFIX: &str = "/v1";

const LOCAL_WALRUS: &str = "http://localhost:31416";

/// Built-in `name -> upstream` table for Walrus testnet.
pub const DEFAULT_ROUTES: [(&str, &str); 14] = [
    ("aggregator1", "https://aggregator.walrus-testnet.walrus.space"),
    ("aggregator2", "https://wal-aggregator-testnet.staketab.org"),
    ("aggregator3", "https://walrus-testnet-aggregator.redundex.com"),
    ("aggregator4", "https://walrus-testnet-aggregator.nodes.guru"),
    ("aggregator5", "https://aggregator.walrus.banansen.dev"),
    ("aggregator6", "https://walrus-testnet-aggregator.everstake.one"),
    ("aggregator7", LOCAL_WALRUS),
    ("publisher1", "https://publisher.walrus-testnet.walrus.space"),
    ("publisher2", "https://wal-publisher-testnet.staketab.org"),
    ("publisher3", "https://walrus-testnet-publisher.redundex.com"),
    ("publisher4", "https://walrus-testnet-publisher.nodes.guru"),
    ("publisher5", "https://publisher.walrus.banansen.dev"),
    ("publisher6", "https://walrus-testnet-publisher.everstake.one"),
    ("publisher7", LOCAL_WALRUS),
];

/// Maps a leading path segment to an upstream base URL.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: BTreeMap<String, Url>,
}

/// A request path resolved against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    pub name: &'a str,
    pub upstream: Url,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = (String, Url)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
        }
    }

    /// Built-in table with `overrides` applied on top.
    pub fn with_overrides(overrides: Option<Vec<(String, Url)>>) -> Result<Self, url::ParseError> {
        let mut table = Self::defaults()?;
        for (name, url) in overrides.into_iter().flatten() {
            table.routes.insert(name, url);
        }
        Ok(table)
    }

    pub fn defaults() -> Result<Self, url::ParseError> {
        let routes = DEFAULT_ROUTES
            .iter()
            .map(|(name, url)| Ok((name.to_string(), Url::parse(url)?)))
            .collect::<Result<Vec<_>, url::ParseError>>()?;
        Ok(Self::new(routes))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn upstream(&self, name: &str) -> Option<&Url> {
        self.routes.get(name)
    }

    /// Resolve `/{name}/v1/...` to the upstream URL with the prefix stripped.
    ///
    /// Returns `None` for unknown names and for paths outside `/v1`.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<ResolvedRoute<'_>> {
        let rest = path.strip_prefix('/')?;
        let (name, tail) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => return None,
        };
        let (name, base) = self.routes.get_key_value(name)?;

        if tail != API_PREFIX && !tail.starts_with("/v1/") {
            return None;
        }

        let mut upstream = base.clone();
        let joined = format!("{}{}", base.path().trim_end_matches('/'), tail);
        upstream.set_path(&joined);
        upstream.set_query(query);

        Some(ResolvedRoute {
            name: name.as_str(),
            upstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_seven_aggregators_and_publishers() {
        let table = RouteTable::defaults().unwrap();
        assert_eq!(table.len(), 14);
        assert_eq!(
            table.upstream("aggregator1").unwrap().as_str(),
            "https://aggregator.walrus-testnet.walrus.space/"
        );
        assert_eq!(table.upstream("publisher7").unwrap().as_str(), "http://localhost:31416/");
        assert_eq!(table.names().filter(|n| n.starts_with("publisher")).count(), 7);
    }

    #[test]
    fn resolve_strips_prefix_and_keeps_query() {
        let table = RouteTable::defaults().unwrap();
        let route = table
            .resolve("/aggregator3/v1/blobs/abc", Some("x=1"))
            .unwrap();
        assert_eq!(route.name, "aggregator3");
        assert_eq!(
            route.upstream.as_str(),
            "https://walrus-testnet-aggregator.redundex.com/v1/blobs/abc?x=1"
        );
    }

    #[test]
    fn resolve_rejects_unknown_and_non_api_paths() {
        let table = RouteTable::defaults().unwrap();
        assert!(table.resolve("/aggregator9/v1/blobs/abc", None).is_none());
        assert!(table.resolve("/aggregator1/admin", None).is_none());
        assert!(table.resolve("/aggregator1/v10/x", None).is_none());
        assert!(table.resolve("/aggregator1", None).is_none());
        assert!(table.resolve("/", None).is_none());
    }

    #[test]
    fn overrides_replace_and_extend() {
        let table = RouteTable::with_overrides(Some(vec![
            ("aggregator1".to_string(), Url::parse("http://127.0.0.1:9000/base/").unwrap()),
            ("mirror-x".to_string(), Url::parse("http://127.0.0.1:9001").unwrap()),
        ]))
        .unwrap();

        assert_eq!(table.len(), 15);
        let route = table.resolve("/aggregator1/v1/blobs/b", None).unwrap();
        assert_eq!(route.upstream.as_str(), "http://127.0.0.1:9000/base/v1/blobs/b");
        assert!(table.resolve("/mirror-x/v1", None).is_some());
    }
}
