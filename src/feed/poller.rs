// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Feed Poller
//!
//! Background task that re-reads the feed on a fixed interval and publishes
//! each complete snapshot through a `watch` channel.
//!
//! ## Strategy
//!
//! - Tick once on start, then every `poll_interval` (default 3 s)
//! - [`FeedHandle::refresh_now`] forces an immediate tick
//! - A tick either publishes a whole new [`Feed`] or leaves the previous one
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. Each poller runs under a child
//! token of the handle, so retargeting cancels exactly one poller and
//! [`FeedHandle::shutdown`] stops whichever is current.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{fetch_feed, Feed, FeedTarget};
use crate::chain::ChainReader;
use crate::config::DEFAULT_POLL_INTERVAL;

/// What a failed tick does to the published state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryFailurePolicy {
    /// Log and keep the previous snapshot untouched.
    #[default]
    SkipTick,
    /// Keep the previous feed but record the error in `last_error`.
    Surface,
}

/// Published poller state.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub feed: Option<Arc<Feed>>,
    pub last_error: Option<String>,
    /// Bumped on every publish.
    pub revision: u64,
}

/// Polls one feed target until cancelled.
pub struct FeedPoller {
    reader: Arc<dyn ChainReader>,
    target: FeedTarget,
    poll_interval: Duration,
    policy: QueryFailurePolicy,
    state: Arc<watch::Sender<FeedState>>,
    refresh: Arc<Notify>,
}

impl FeedPoller {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        target: FeedTarget,
        state: Arc<watch::Sender<FeedState>>,
        refresh: Arc<Notify>,
    ) -> Self {
        Self {
            reader,
            target,
            poll_interval: DEFAULT_POLL_INTERVAL,
            policy: QueryFailurePolicy::default(),
            state,
            refresh,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_policy(mut self, policy: QueryFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            service_id = %self.target.service_id,
            viewer = %self.target.viewer,
            interval_ms = self.poll_interval.as_millis() as u64,
            "Feed poller starting"
        );

        loop {
            tokio::select! {
                _ = self.poll_step(&shutdown) => {},
                _ = shutdown.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = self.refresh.notified() => debug!("Feed refresh requested"),
                _ = shutdown.cancelled() => break,
            }
        }

        info!(service_id = %self.target.service_id, "Feed poller shutting down");
    }

    /// Execute one tick: read the feed and publish the outcome.
    async fn poll_step(&self, shutdown: &CancellationToken) {
        let result = fetch_feed(self.reader.as_ref(), &self.target).await;

        // Publishing happens under the channel lock, so a cancelled poller
        // can never overwrite the state cleared by a retarget.
        self.state.send_if_modified(|state| {
            if shutdown.is_cancelled() {
                return false;
            }
            match &result {
                Ok(feed) => {
                    state.feed = Some(Arc::new(feed.clone()));
                    state.last_error = None;
                    state.revision += 1;
                    true
                }
                Err(e) => {
                    warn!(
                        service_id = %self.target.service_id,
                        error = %e,
                        policy = ?self.policy,
                        "Feed query failed"
                    );
                    match self.policy {
                        QueryFailurePolicy::SkipTick => false,
                        QueryFailurePolicy::Surface => {
                            state.last_error = Some(e.to_string());
                            state.revision += 1;
                            true
                        }
                    }
                }
            }
        });
    }
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Owner of the current feed poller.
pub struct FeedHandle {
    reader: Arc<dyn ChainReader>,
    poll_interval: Duration,
    policy: QueryFailurePolicy,
    state: Arc<watch::Sender<FeedState>>,
    refresh: Arc<Notify>,
    root: CancellationToken,
    running: Mutex<Running>,
}

impl FeedHandle {
    /// Start polling `target` with the default interval and policy.
    pub fn spawn(reader: Arc<dyn ChainReader>, target: FeedTarget) -> Self {
        Self::spawn_with(reader, target, DEFAULT_POLL_INTERVAL, QueryFailurePolicy::default())
    }

    pub fn spawn_with(
        reader: Arc<dyn ChainReader>,
        target: FeedTarget,
        poll_interval: Duration,
        policy: QueryFailurePolicy,
    ) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        let state = Arc::new(state);
        let refresh = Arc::new(Notify::new());
        let root = CancellationToken::new();

        let running = start(
            &reader,
            target,
            poll_interval,
            policy,
            &state,
            &refresh,
            &root,
        );

        Self {
            reader,
            poll_interval,
            policy,
            state,
            refresh,
            root,
            running: Mutex::new(running),
        }
    }

    /// New receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Tick now instead of waiting for the interval.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Follow a different service or viewer.
    ///
    /// Cancels the current poller, clears the published feed and starts a
    /// new poller for `target`.
    pub fn retarget(&self, target: FeedTarget) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.token.cancel();

        self.state.send_modify(|state| {
            state.feed = None;
            state.last_error = None;
            state.revision += 1;
        });

        info!(service_id = %target.service_id, viewer = %target.viewer, "Retargeting feed poller");
        *running = start(
            &self.reader,
            target,
            self.poll_interval,
            self.policy,
            &self.state,
            &self.refresh,
            &self.root,
        );
    }

    /// Stop polling without waiting for the task.
    pub fn stop(&self) {
        self.root.cancel();
    }

    /// Stop polling and wait for the poller task to exit.
    pub async fn shutdown(self) {
        self.stop();
        let running = self.running.into_inner().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = running.task.await {
            warn!(error = %e, "Feed poller task failed");
        }
    }
}

fn start(
    reader: &Arc<dyn ChainReader>,
    target: FeedTarget,
    poll_interval: Duration,
    policy: QueryFailurePolicy,
    state: &Arc<watch::Sender<FeedState>>,
    refresh: &Arc<Notify>,
    root: &CancellationToken,
) -> Running {
    let token = root.child_token();
    let poller = FeedPoller::new(reader.clone(), target, state.clone(), refresh.clone())
        .with_poll_interval(poll_interval)
        .with_policy(policy);
    let task = tokio::spawn(poller.run(token.clone()));
    Running { token, task }
}
