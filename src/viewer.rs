// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Subscription Viewer
//!
//! Drives one viewer's interaction with a feed: offers the subscribe or view
//! action, runs it, and keeps the displayed state in a single struct with
//! explicit transitions.
//!
//! ## Phases
//!
//! | Phase | Meaning |
//! |-------|---------|
//! | `Idle` | No feed loaded yet |
//! | `Polling` | Feed shown, viewer closed |
//! | `Viewing` | Decrypted artifacts on display |
//! | `Error` | One error message pending dismissal |

use std::sync::Arc;

use tracing::{info, warn};

use crate::chain::{
    explorer_object_url, short_object_label, transactions::subscribe_transaction,
    SubscriptionApproval, TransactionExecutor,
};
use crate::feed::{Feed, FeedHandle};
use crate::retrieval::{DecryptedArtifact, RetrievalError, RetrievalOutcome, RetrievalPipeline};
use crate::session::{SessionError, SessionKeyManager};

/// Derived display phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Idle,
    Polling,
    Viewing,
    Error,
}

/// Everything the viewer displays.
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    pub feed: Option<Arc<Feed>>,
    pub artifacts: Vec<DecryptedArtifact>,
    pub error: Option<String>,
    pub partial_error: Option<String>,
    pub is_viewer_open: bool,
    /// Bumped whenever a new artifact set is shown.
    pub reload_key: u64,
}

impl ViewerState {
    pub fn phase(&self) -> ViewerPhase {
        if self.error.is_some() {
            ViewerPhase::Error
        } else if self.is_viewer_open {
            ViewerPhase::Viewing
        } else if self.feed.is_some() {
            ViewerPhase::Polling
        } else {
            ViewerPhase::Idle
        }
    }

    /// Replace the feed with the latest snapshot.
    pub fn apply_feed(&mut self, feed: Option<Arc<Feed>>) {
        self.feed = feed;
    }

    /// Reset the previous run before a new one starts.
    pub fn begin_retrieval(&mut self) {
        self.error = None;
        self.partial_error = None;
        self.artifacts.clear();
    }

    pub fn apply_outcome(&mut self, outcome: Result<RetrievalOutcome, RetrievalError>) {
        match outcome {
            Ok(outcome) => {
                self.artifacts = outcome.artifacts;
                self.partial_error = outcome.partial_notice;
                self.error = None;
                self.is_viewer_open = true;
                self.reload_key += 1;
            }
            Err(e) => {
                self.artifacts.clear();
                self.partial_error = None;
                self.error = Some(e.user_message().to_string());
                self.is_viewer_open = false;
            }
        }
    }

    pub fn close_viewer(&mut self) {
        self.is_viewer_open = false;
        self.artifacts.clear();
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

/// The action a feed currently offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    Subscribe {
        service_id: String,
        fee: u64,
    },
    View {
        blob_ids: Vec<String>,
        service_id: String,
        fee: u64,
        subscription_id: String,
    },
}

impl ViewAction {
    pub fn from_feed(feed: &Feed) -> Self {
        match &feed.subscription_id {
            Some(subscription_id) => Self::View {
                blob_ids: feed.blob_ids.clone(),
                service_id: feed.id.clone(),
                fee: feed.fee,
                subscription_id: subscription_id.clone(),
            },
            None => Self::Subscribe {
                service_id: feed.id.clone(),
                fee: feed.fee,
            },
        }
    }
}

/// Explorer URL and short label for an object id.
pub fn explorer_link(id: &str) -> (String, String) {
    (explorer_object_url(id), short_object_label(id))
}

/// Runs view actions for one account.
pub struct SubscriptionViewer {
    package_id: String,
    viewer: String,
    sessions: Arc<SessionKeyManager>,
    pipeline: RetrievalPipeline,
    executor: Arc<dyn TransactionExecutor>,
    feed: Option<Arc<FeedHandle>>,
    state: ViewerState,
}

impl SubscriptionViewer {
    pub fn new(
        package_id: impl Into<String>,
        viewer: impl Into<String>,
        sessions: Arc<SessionKeyManager>,
        pipeline: RetrievalPipeline,
        executor: Arc<dyn TransactionExecutor>,
    ) -> Self {
        Self {
            package_id: package_id.into(),
            viewer: viewer.into(),
            sessions,
            pipeline,
            executor,
            feed: None,
            state: ViewerState::default(),
        }
    }

    /// Refresh this poller after a subscription purchase.
    pub fn with_feed(mut self, feed: Arc<FeedHandle>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ViewerState {
        &mut self.state
    }

    pub async fn on_view(&mut self, action: ViewAction) {
        match action {
            ViewAction::Subscribe { service_id, fee } => self.subscribe(&service_id, fee).await,
            ViewAction::View {
                blob_ids,
                service_id,
                subscription_id,
                ..
            } => self.view(&blob_ids, service_id, subscription_id).await,
        }
    }

    async fn subscribe(&mut self, service_id: &str, fee: u64) {
        let tx = subscribe_transaction(&self.package_id, service_id, fee, &self.viewer);
        match self.executor.execute(&tx).await {
            Ok(result) => {
                info!(digest = %result.digest, service_id, fee, "Subscription purchased");
                if let Some(feed) = &self.feed {
                    feed.refresh_now();
                }
            }
            Err(e) => warn!(service_id, error = %e, "Subscription purchase failed"),
        }
    }

    async fn view(&mut self, blob_ids: &[String], service_id: String, subscription_id: String) {
        let session = match self.sessions.ensure_session_key(&self.viewer).await {
            Ok(session) => session,
            Err(SessionError::SigningDeclined(reason)) => {
                info!(reason = %reason, "Viewer declined session key signature");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not obtain session key");
                return;
            }
        };

        let approval = SubscriptionApproval {
            package_id: self.package_id.clone(),
            service_id,
            subscription_id,
        };

        self.state.begin_retrieval();
        let outcome = self
            .pipeline
            .download_and_decrypt(blob_ids, &session, &approval)
            .await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Retrieval failed");
        }
        self.state.apply_outcome(outcome);
    }
}
