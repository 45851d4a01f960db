// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line entry points.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bridge::{BridgeError, SealBridgeClient};
use crate::chain::{ChainError, SuiClient};
use crate::config::{AppConfig, ConfigError};
use crate::feed::{Feed, FeedHandle, FeedState, FeedTarget, QueryFailurePolicy};
use crate::gateway::{router, RouteTable};
use crate::retrieval::{DecryptedArtifact, RetrievalPipeline};
use crate::session::SessionKeyManager;
use crate::state::AppState;
use crate::viewer::{SubscriptionViewer, ViewAction};
use crate::walrus::{AggregatorClient, MirrorPool};

/// How long `view --subscribe` waits for the purchase to show up on chain.
const SUBSCRIPTION_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "sealed-feed", version, about = "Subscription-gated encrypted feed client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the aggregator gateway.
    Gateway,
    /// Follow a feed and log every snapshot.
    Watch {
        /// Record query failures in the published state instead of skipping them.
        #[arg(long)]
        surface_errors: bool,
    },
    /// Download and decrypt every file of a feed.
    View {
        /// Directory the decrypted files are written to.
        #[arg(long, default_value = "decrypted")]
        out_dir: PathBuf,
        /// Purchase a subscription first if the viewer has none.
        #[arg(long)]
        subscribe: bool,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Setup(String),

    #[error("{0}")]
    View(String),

    #[error("interrupted")]
    Interrupted,
}

pub async fn run(cli: Cli, shutdown: CancellationToken) -> Result<(), CliError> {
    let config = AppConfig::from_env()?;
    match cli.command {
        Command::Gateway => run_gateway(&config, shutdown).await,
        Command::Watch { surface_errors } => {
            let policy = if surface_errors {
                QueryFailurePolicy::Surface
            } else {
                QueryFailurePolicy::SkipTick
            };
            run_watch(&config, policy, shutdown).await
        }
        Command::View { out_dir, subscribe } => {
            run_view(&config, &out_dir, subscribe, shutdown).await
        }
    }
}

pub async fn run_gateway(config: &AppConfig, shutdown: CancellationToken) -> Result<(), CliError> {
    let routes = RouteTable::with_overrides(config.gateway_routes.clone())
        .map_err(|e| CliError::Setup(format!("invalid built-in route: {e}")))?;
    let route_count = routes.len();
    let state = AppState::new(routes, config.insecure_upstream_tls)
        .map_err(|e| CliError::Setup(format!("failed to build upstream client: {e}")))?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| CliError::Setup(format!("invalid bind address: {e}")))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        %addr,
        routes = route_count,
        insecure_upstream_tls = config.insecure_upstream_tls,
        "Gateway listening (docs at /docs)"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Gateway stopped");
    Ok(())
}

fn feed_target(config: &AppConfig) -> Result<FeedTarget, CliError> {
    Ok(FeedTarget {
        package_id: config.require_package_id()?.to_string(),
        service_id: config.require_service_id()?.to_string(),
        viewer: config.require_viewer_address()?.to_string(),
    })
}

fn spawn_feed(config: &AppConfig, policy: QueryFailurePolicy) -> Result<FeedHandle, CliError> {
    let target = feed_target(config)?;
    let reader = Arc::new(SuiClient::new(config.sui_rpc_url.clone())?);
    Ok(FeedHandle::spawn_with(reader, target, config.poll_interval, policy))
}

pub async fn run_watch(
    config: &AppConfig,
    policy: QueryFailurePolicy,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let handle = spawn_feed(config, policy)?;
    let mut rx = handle.subscribe();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                log_feed_state(&state);
            }
            _ = shutdown.cancelled() => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn log_feed_state(state: &FeedState) {
    if let Some(error) = &state.last_error {
        warn!(revision = state.revision, error = %error, "Feed query failing");
    }
    match &state.feed {
        Some(feed) => info!(
            revision = state.revision,
            service_id = %feed.id,
            name = %feed.name,
            blobs = feed.blob_ids.len(),
            subscription_id = feed.subscription_id.as_deref().unwrap_or("-"),
            action = %feed.affordance_label(),
            "Feed updated"
        ),
        None => info!(revision = state.revision, "Waiting for feed"),
    }
}

/// Wait until the published feed satisfies `accept`.
async fn wait_for_feed<F>(
    rx: &mut watch::Receiver<FeedState>,
    shutdown: &CancellationToken,
    accept: F,
) -> Result<Arc<Feed>, CliError>
where
    F: Fn(&Feed) -> bool,
{
    loop {
        let current = rx.borrow_and_update().feed.clone();
        if let Some(feed) = current {
            if accept(&feed) {
                return Ok(feed);
            }
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Err(CliError::Interrupted);
                }
            }
            _ = shutdown.cancelled() => return Err(CliError::Interrupted),
        }
    }
}

pub async fn run_view(
    config: &AppConfig,
    out_dir: &Path,
    subscribe: bool,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let package_id = config.require_package_id()?.to_string();
    let viewer_address = config.require_viewer_address()?.to_string();
    let bridge = Arc::new(SealBridgeClient::new(config.require_bridge_url()?.clone())?);

    let handle = Arc::new(spawn_feed(config, QueryFailurePolicy::SkipTick)?);
    let mut rx = handle.subscribe();

    let pool = MirrorPool::via_gateway(&config.mirror_base_url, &config.mirrors)
        .map_err(CliError::Setup)?;
    let pipeline = RetrievalPipeline::new(
        AggregatorClient::new(pool).with_timeout(config.blob_fetch_timeout),
        bridge.clone(),
        bridge.clone(),
    )
    .with_threshold(config.key_threshold);
    let sessions = Arc::new(SessionKeyManager::new(package_id.clone(), bridge.clone()));
    let mut viewer = SubscriptionViewer::new(package_id, viewer_address, sessions, pipeline, bridge)
        .with_feed(handle.clone());

    let work = async {
        let mut feed = wait_for_feed(&mut rx, &shutdown, |_| true).await?;
        info!(service_id = %feed.id, blobs = feed.blob_ids.len(), action = %feed.affordance_label(), "Feed loaded");

        if !feed.has_subscription() {
            if !subscribe {
                return Err(CliError::View(format!(
                    "no valid subscription ({}); rerun with --subscribe",
                    feed.affordance_label()
                )));
            }
            viewer.on_view(ViewAction::from_feed(&feed)).await;
            feed = tokio::time::timeout(
                SUBSCRIPTION_WAIT,
                wait_for_feed(&mut rx, &shutdown, Feed::has_subscription),
            )
            .await
            .map_err(|_| CliError::View("subscription did not appear on chain".to_string()))??;
        }

        viewer.state_mut().apply_feed(Some(feed.clone()));
        viewer.on_view(ViewAction::from_feed(&feed)).await;

        let state = viewer.state();
        if let Some(error) = &state.error {
            return Err(CliError::View(error.clone()));
        }
        if !state.is_viewer_open {
            return Err(CliError::View("no session key was issued".to_string()));
        }
        if let Some(notice) = &state.partial_error {
            warn!("{notice}");
        }

        let written = write_artifacts(out_dir, &state.artifacts).await?;
        info!(files = written.len(), out_dir = %out_dir.display(), "Decrypted files written");
        Ok::<(), CliError>(())
    };

    let result = until_shutdown(work, &shutdown).await;
    handle.stop();
    result
}

/// Run `work` unless `shutdown` fires first; the pending work is dropped.
async fn until_shutdown<T, F>(work: F, shutdown: &CancellationToken) -> Result<T, CliError>
where
    F: Future<Output = Result<T, CliError>>,
{
    tokio::select! {
        result = work => result,
        _ = shutdown.cancelled() => Err(CliError::Interrupted),
    }
}

/// Write artifacts as `{index:03}-{id}.{ext}` under `out_dir`.
pub async fn write_artifacts(
    out_dir: &Path,
    artifacts: &[DecryptedArtifact],
) -> Result<Vec<PathBuf>, CliError> {
    tokio::fs::create_dir_all(out_dir).await?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = out_dir.join(format!(
            "{:03}-{}.{}",
            artifact.index,
            artifact.id,
            artifact.file_extension()
        ));
        tokio::fs::write(&path, &artifact.bytes).await?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn artifact(index: usize, bytes: &[u8]) -> DecryptedArtifact {
        DecryptedArtifact {
            id: Uuid::new_v4(),
            index,
            blob_id: format!("blob-{index}"),
            content_type: crate::retrieval::sniff_content_type(bytes),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["sealed-feed", "view", "--out-dir", "/tmp/x", "--subscribe"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::View { ref out_dir, subscribe: true } if out_dir == Path::new("/tmp/x")
        ));

        let cli = Cli::try_parse_from(["sealed-feed", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { surface_errors: false }));

        assert!(Cli::try_parse_from(["sealed-feed", "explode"]).is_err());
    }

    #[tokio::test]
    async fn artifacts_are_written_in_order_with_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let artifacts = vec![
            artifact(0, b"\x89PNG\r\n\x1a\nA"),
            artifact(1, &[0xff, 0xd8, 0xff, 0x00]),
            artifact(2, b"plain"),
        ];

        let written = write_artifacts(&out, &artifacts).await.unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[0].starts_with("000-") && names[0].ends_with(".png"));
        assert!(names[1].starts_with("001-") && names[1].ends_with(".jpg"));
        assert!(names[2].starts_with("002-") && names[2].ends_with(".bin"));
        assert_eq!(tokio::fs::read(&written[2]).await.unwrap(), b"plain");
    }

    #[tokio::test]
    async fn shutdown_interrupts_in_flight_work() {
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = until_shutdown(std::future::pending::<Result<(), CliError>>(), &shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Interrupted));

        let done = until_shutdown(async { Ok::<_, CliError>(7) }, &CancellationToken::new()).await;
        assert_eq!(done.unwrap(), 7);
    }

    #[tokio::test]
    async fn wait_for_feed_stops_on_shutdown() {
        let (_tx, mut rx) = watch::channel(FeedState::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let err = wait_for_feed(&mut rx, &shutdown, |_| true).await.unwrap_err();
        assert!(matches!(err, CliError::Interrupted));
    }
}
