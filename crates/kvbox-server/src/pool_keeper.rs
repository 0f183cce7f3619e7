// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background task that owns closing the connection pool.
//!
//! The keeper holds the pool open until its close token is cancelled, emitting a
//! heartbeat log line every `heartbeat_interval` while it waits. On close it
//! closes the pool exactly once and exits. The lifecycle joins the task through
//! [`KeeperHandle::wait`] so the process cannot exit while the pool is mid-close.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DEFAULT_KEEPALIVE_INTERVAL;
use crate::error::ShutdownError;
use crate::persistence::Persistence;

/// Configuration for the pool keeper.
#[derive(Debug, Clone)]
pub struct PoolKeeperConfig {
    /// How often to log a heartbeat while waiting for the close request.
    pub heartbeat_interval: Duration,
}

impl Default for PoolKeeperConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// Background worker that closes the pool when asked.
pub struct PoolKeeper {
    persistence: Arc<dyn Persistence>,
    config: PoolKeeperConfig,
    close: CancellationToken,
    heartbeats: Arc<AtomicU64>,
}

impl PoolKeeper {
    /// Create a keeper. Cancelling `close` (or any of its parents) closes the pool.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        config: PoolKeeperConfig,
        close: CancellationToken,
    ) -> Self {
        Self {
            persistence,
            config,
            close,
            heartbeats: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the keeper loop until the close token is cancelled.
    pub async fn run(&self) {
        info!(
            heartbeat_interval_secs = self.config.heartbeat_interval.as_secs_f64(),
            "Pool keeper started"
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.heartbeat_interval,
            self.config.heartbeat_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.close.cancelled() => {
                    info!("Closing db-pool...");
                    self.persistence.close().await;
                    break;
                }

                _ = ticker.tick() => {
                    let beats = self.heartbeats.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(heartbeats = beats, "Waiting for db-pool to close...");
                }
            }
        }

        info!("Pool keeper stopped");
    }

    /// Spawn the keeper on the runtime.
    pub fn spawn(self) -> KeeperHandle {
        let close = self.close.clone();
        let heartbeats = self.heartbeats.clone();
        let join = tokio::spawn(async move {
            self.run().await;
        });

        KeeperHandle {
            join,
            close,
            heartbeats,
        }
    }
}

/// Handle to a spawned [`PoolKeeper`].
#[derive(Debug)]
pub struct KeeperHandle {
    join: JoinHandle<()>,
    close: CancellationToken,
    heartbeats: Arc<AtomicU64>,
}

impl KeeperHandle {
    /// Ask the keeper to close the pool.
    pub fn request_close(&self) {
        self.close.cancel();
    }

    /// Heartbeats emitted so far.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    /// Whether the keeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait up to `timeout` for the keeper to confirm it has closed the pool.
    pub async fn wait(self, timeout: Duration) -> Result<(), ShutdownError> {
        let mut join = self.join;
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("Pool keeper task panicked: {}", e);
                Err(ShutdownError::TaskPanicked {
                    task: "pool keeper",
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                join.abort();
                Err(ShutdownError::PoolCloseTimeout(timeout))
            }
        }
    }
}
