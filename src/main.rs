// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sealed_feed::cli::{self, Cli};
use sealed_feed::logging::{init_tracing, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());
    let cli = Cli::parse();

    // Ctrl-C cancels the gateway, the poller and any in-flight view.
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    match cli::run(cli, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "sealed-feed failed");
            ExitCode::FAILURE
        }
    }
}
