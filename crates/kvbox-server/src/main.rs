// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! kvbox-server - Key-Value HTTP Service
//!
//! Connects to PostgreSQL, serves the item API on port 8000 and shuts down
//! gracefully on SIGINT, SIGTERM or SIGHUP.

use std::process::ExitCode;

use tracing::{error, info, warn};

use kvbox_server::config::Config;
use kvbox_server::lifecycle::{Lifecycle, acquire_pool};
use kvbox_server::signal::SignalListener;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvbox_server=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let config = Config::from_env()?;

    // Install handlers before connecting so an early signal is not lost
    let mut signals = SignalListener::install()?;

    info!(
        http_addr = %config.http_addr,
        operations_timeout_secs = config.operations_timeout.as_secs(),
        "Starting kvbox-server"
    );

    let status = Lifecycle::new(config.clone())
        .run(acquire_pool(&config), async move { signals.recv().await })
        .await;

    Ok(status.into())
}
