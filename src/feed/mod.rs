// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Feed
//!
//! A feed is a subscription service object plus the encrypted blobs stored
//! as its dynamic fields, seen from one viewer's account. Each read builds a
//! complete [`Feed`] from four chain queries:
//!
//! 1. Dynamic field names under the service (the blob ids, every page)
//! 2. The service object (`fee`, `ttl`, `owner`, `name`)
//! 3. The viewer's `Subscription` objects for the package
//! 4. The shared clock (`0x6`) for the current chain time
//!
//! The [`poller`] module runs this on an interval and publishes snapshots.

pub mod poller;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::chain::{
    same_object_id, ChainError, ChainReader, ObjectData, CLOCK_OBJECT_ID,
};

pub use poller::{FeedHandle, FeedPoller, FeedState, QueryFailurePolicy};

const MS_PER_MINUTE: u64 = 60_000;

/// Which feed to read, and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTarget {
    pub package_id: String,
    pub service_id: String,
    pub viewer: String,
}

impl FeedTarget {
    pub fn subscription_type(&self) -> String {
        format!("{}::subscription::Subscription", self.package_id)
    }
}

/// Immutable view of a service at one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: String,
    /// Subscription price in MIST.
    pub fee: u64,
    /// Subscription lifetime in milliseconds.
    pub ttl: u64,
    pub owner: String,
    pub name: String,
    pub blob_ids: Vec<String>,
    /// The viewer's currently valid subscription, if any.
    pub subscription_id: Option<String>,
}

impl Feed {
    pub fn has_subscription(&self) -> bool {
        self.subscription_id.is_some()
    }

    pub fn ttl_minutes(&self) -> u64 {
        self.ttl / MS_PER_MINUTE
    }

    /// Text of the action offered to the viewer.
    pub fn affordance_label(&self) -> String {
        if self.has_subscription() {
            "Download and decrypt all files".to_string()
        } else {
            format!(
                "Subscribe for {} MIST for {} minutes",
                self.fee,
                self.ttl_minutes()
            )
        }
    }
}

/// A `Subscription` object owned by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    /// Chain time of purchase in milliseconds.
    pub created_at: u64,
    pub service_id: String,
}

impl Subscription {
    /// Parse from Move object fields. Returns `None` for foreign shapes.
    pub fn from_object(object: &ObjectData) -> Option<Self> {
        let fields = object.fields();
        Some(Self {
            id: uid(fields).unwrap_or_else(|| object.object_id.clone()),
            created_at: u64_value(&fields["created_at"])?,
            service_id: fields["service_id"].as_str()?.to_string(),
        })
    }

    /// Valid while `created_at + ttl` is strictly in the future.
    pub fn is_valid_at(&self, ttl_ms: u64, now_ms: u64) -> bool {
        self.created_at.saturating_add(ttl_ms) > now_ms
    }
}

/// First subscription for `service_id` that is still valid at `now_ms`.
pub fn find_valid_subscription<'a>(
    subscriptions: &'a [Subscription],
    service_id: &str,
    ttl_ms: u64,
    now_ms: u64,
) -> Option<&'a Subscription> {
    subscriptions
        .iter()
        .filter(|s| same_object_id(&s.service_id, service_id))
        .find(|s| s.is_valid_at(ttl_ms, now_ms))
}

/// Read one complete feed snapshot.
pub async fn fetch_feed(reader: &dyn ChainReader, target: &FeedTarget) -> Result<Feed, ChainError> {
    let subscription_type = target.subscription_type();
    let (fields, service, owned, clock) = tokio::try_join!(
        reader.get_dynamic_fields(&target.service_id),
        reader.get_object(&target.service_id),
        reader.get_owned_objects(&target.viewer, &subscription_type),
        reader.get_object(CLOCK_OBJECT_ID),
    )?;

    let service_fields = service.fields();
    let service_id = uid(service_fields).unwrap_or_else(|| service.object_id.clone());
    let fee = required_u64(service_fields, "fee", &service_id)?;
    let ttl = required_u64(service_fields, "ttl", &service_id)?;
    let now_ms = required_u64(clock.fields(), "timestamp_ms", CLOCK_OBJECT_ID)?;

    let subscriptions: Vec<Subscription> =
        owned.iter().filter_map(Subscription::from_object).collect();
    let subscription_id =
        find_valid_subscription(&subscriptions, &service_id, ttl, now_ms).map(|s| s.id.clone());

    let blob_ids: Vec<String> = fields.iter().map(|f| f.name.value_string()).collect();

    debug!(
        service_id = %service_id,
        blobs = blob_ids.len(),
        subscriptions = subscriptions.len(),
        subscribed = subscription_id.is_some(),
        "Fetched feed"
    );

    Ok(Feed {
        id: service_id,
        fee,
        ttl,
        owner: string_field(service_fields, "owner"),
        name: string_field(service_fields, "name"),
        blob_ids,
        subscription_id,
    })
}

/// `fields.id.id` of a Move object with a `UID`.
fn uid(fields: &Value) -> Option<String> {
    fields["id"]["id"].as_str().map(str::to_string)
}

/// Move `u64` values arrive as decimal strings.
fn u64_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn required_u64(fields: &Value, name: &str, object_id: &str) -> Result<u64, ChainError> {
    u64_value(&fields[name]).ok_or_else(|| {
        ChainError::InvalidResponse(format!("object {object_id} has no u64 field `{name}`"))
    })
}

fn string_field(fields: &Value, name: &str) -> String {
    fields[name].as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chain::{DynamicFieldInfo, DynamicFieldName, MoveContent};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub(crate) const PACKAGE: &str = "0xpkg";
    pub(crate) const SERVICE: &str = "0x5e";
    pub(crate) const VIEWER: &str = "0xa11ce";

    pub(crate) fn object(id: &str, fields: Value) -> ObjectData {
        ObjectData {
            object_id: id.to_string(),
            object_type: None,
            content: Some(MoveContent {
                data_type: "moveObject".to_string(),
                struct_type: None,
                fields,
            }),
        }
    }

    pub(crate) fn subscription_object(id: &str, created_at: u64, service_id: &str) -> ObjectData {
        object(
            id,
            json!({ "id": { "id": id }, "created_at": created_at.to_string(), "service_id": service_id }),
        )
    }

    /// In-memory chain with mutable feed state.
    pub(crate) struct FakeChain {
        pub(crate) blob_ids: Mutex<Vec<String>>,
        pub(crate) services: Mutex<Vec<(String, u64, u64)>>,
        pub(crate) subscriptions: Mutex<Vec<ObjectData>>,
        pub(crate) now_ms: AtomicUsize,
        pub(crate) fail: AtomicBool,
        pub(crate) reads: AtomicUsize,
    }

    impl Default for FakeChain {
        fn default() -> Self {
            Self {
                blob_ids: Mutex::new(vec!["blob-1".into(), "blob-2".into()]),
                services: Mutex::new(vec![(SERVICE.to_string(), 250, 3_600_000)]),
                subscriptions: Mutex::new(Vec::new()),
                now_ms: AtomicUsize::new(10_000_000),
                fail: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl FakeChain {
        fn check(&self) -> Result<(), ChainError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ChainError::Rpc("fullnode unavailable".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChainReader for FakeChain {
        async fn get_object(&self, id: &str) -> Result<ObjectData, ChainError> {
            self.check()?;
            if id == CLOCK_OBJECT_ID {
                let now = self.now_ms.load(Ordering::SeqCst);
                return Ok(object(id, json!({ "timestamp_ms": now.to_string() })));
            }
            let services = self.services.lock().unwrap();
            let (sid, fee, ttl) = services
                .iter()
                .find(|(sid, _, _)| sid == id)
                .ok_or_else(|| ChainError::ObjectNotFound(id.to_string()))?;
            Ok(object(
                sid,
                json!({
                    "id": { "id": sid },
                    "fee": fee.to_string(),
                    "ttl": ttl.to_string(),
                    "owner": "0x0a",
                    "name": format!("feed {sid}"),
                }),
            ))
        }

        async fn get_owned_objects(
            &self,
            _owner: &str,
            _struct_type: &str,
        ) -> Result<Vec<ObjectData>, ChainError> {
            self.check()?;
            Ok(self.subscriptions.lock().unwrap().clone())
        }

        async fn get_dynamic_fields(&self, _parent_id: &str) -> Result<Vec<DynamicFieldInfo>, ChainError> {
            self.check()?;
            Ok(self
                .blob_ids
                .lock()
                .unwrap()
                .iter()
                .map(|id| DynamicFieldInfo {
                    name: DynamicFieldName {
                        name_type: "0x1::string::String".into(),
                        value: json!(id),
                    },
                    object_id: None,
                })
                .collect())
        }
    }

    pub(crate) fn target(service_id: &str) -> FeedTarget {
        FeedTarget {
            package_id: PACKAGE.to_string(),
            service_id: service_id.to_string(),
            viewer: VIEWER.to_string(),
        }
    }

    fn sub(id: &str, created_at: u64, service_id: &str) -> Subscription {
        Subscription {
            id: id.to_string(),
            created_at,
            service_id: service_id.to_string(),
        }
    }

    #[test]
    fn subscription_at_exact_expiry_is_invalid() {
        let s = sub("0x1", 1_000, SERVICE);
        assert!(s.is_valid_at(500, 1_499));
        assert!(!s.is_valid_at(500, 1_500));
    }

    #[test]
    fn first_valid_subscription_for_the_service_wins() {
        let subs = vec![
            sub("0xother", 10_000, "0x99"),
            sub("0xexpired", 0, SERVICE),
            sub("0xfirst", 9_000, SERVICE),
            sub("0xsecond", 9_500, SERVICE),
        ];
        let found = find_valid_subscription(&subs, SERVICE, 2_000, 10_000).unwrap();
        assert_eq!(found.id, "0xfirst");
        assert!(find_valid_subscription(&subs, "0x77", 2_000, 10_000).is_none());
    }

    #[test]
    fn service_ids_compare_normalized() {
        let subs = vec![sub("0x1", 0, "0x000005E")];
        assert!(find_valid_subscription(&subs, SERVICE, 10, 5).is_some());
    }

    #[test]
    fn affordance_label_depends_on_subscription() {
        let mut feed = Feed {
            id: SERVICE.into(),
            fee: 250,
            ttl: 3_600_000,
            owner: "0x0a".into(),
            name: "feed".into(),
            blob_ids: vec![],
            subscription_id: None,
        };
        assert_eq!(feed.affordance_label(), "Subscribe for 250 MIST for 60 minutes");
        feed.subscription_id = Some("0xsub".into());
        assert_eq!(feed.affordance_label(), "Download and decrypt all files");
    }

    #[test]
    fn foreign_objects_are_not_subscriptions() {
        assert!(Subscription::from_object(&object("0x1", json!({ "balance": "3" }))).is_none());
        let parsed = Subscription::from_object(&subscription_object("0x2", 7, SERVICE)).unwrap();
        assert_eq!(parsed, sub("0x2", 7, SERVICE));
    }

    #[tokio::test]
    async fn fetch_feed_combines_all_reads() {
        let chain = FakeChain::default();
        chain.subscriptions.lock().unwrap().extend([
            subscription_object("0xold", 0, SERVICE),
            subscription_object("0xlive", 9_000_000, SERVICE),
        ]);

        let feed = fetch_feed(&chain, &target(SERVICE)).await.unwrap();

        assert_eq!(feed.id, SERVICE);
        assert_eq!(feed.fee, 250);
        assert_eq!(feed.ttl, 3_600_000);
        assert_eq!(feed.name, "feed 0x5e");
        assert_eq!(feed.blob_ids, vec!["blob-1", "blob-2"]);
        assert_eq!(feed.subscription_id.as_deref(), Some("0xlive"));
        assert_eq!(chain.reads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fetch_feed_fails_as_a_whole() {
        let chain = FakeChain::default();
        chain.fail.store(true, Ordering::SeqCst);
        assert!(fetch_feed(&chain, &target(SERVICE)).await.is_err());

        let chain = FakeChain::default();
        assert!(matches!(
            fetch_feed(&chain, &target("0xnothere")).await,
            Err(ChainError::ObjectNotFound(_))
        ));
    }
}
