// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service lifecycle.
//!
//! Startup runs strictly in order: connect, spawn the pool keeper, create the
//! schema, build the router, start the listener. A failure at any step stops the
//! sequence; whatever is already running (at most the keeper) is closed before
//! [`Lifecycle::run`] returns.
//!
//! While serving, the coordinator waits for the first of three triggers:
//!
//! | Trigger | Exit status |
//! |---------|-------------|
//! | OS signal | success, unless a shutdown step fails |
//! | Listener failure | failure |
//! | Root token cancelled | failure |
//!
//! Only the first trigger is acted on. Shutdown then drains the listener, asks
//! the keeper to close the pool and joins it. Each step is bounded by the
//! operations timeout.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handlers::{RouterConfig, build_router};
use crate::persistence::{Persistence, PersistenceError, PostgresPersistence, with_timeout};
use crate::pool_keeper::{KeeperHandle, PoolKeeper, PoolKeeperConfig};
use crate::server::{ServerHandle, start_server};
use crate::signal::ShutdownSignal;

/// Process-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Connecting and initializing.
    Starting,
    /// The listener is accepting requests.
    Serving,
    /// The single shutdown attempt is in progress.
    ShuttingDown,
    /// All resources are released.
    Stopped,
}

/// What started the shutdown.
#[derive(Debug)]
pub enum ShutdownTrigger {
    /// An OS termination signal.
    Signal(ShutdownSignal),
    /// The listener failed. `None` if it exited without reporting a cause.
    ServerFailure(Option<Error>),
    /// The root cancellation token was cancelled.
    Cancelled,
}

impl ShutdownTrigger {
    fn is_signal(&self) -> bool {
        matches!(self, Self::Signal(_))
    }
}

/// Process exit status decided at the end of shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean, signal-triggered shutdown.
    Success,
    /// Startup failure, listener failure, or a shutdown step that errored.
    Failure,
}

impl ExitStatus {
    /// Whether this is [`ExitStatus::Success`].
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => ExitCode::SUCCESS,
            ExitStatus::Failure => ExitCode::FAILURE,
        }
    }
}

/// Drives startup, serving and shutdown of the service.
pub struct Lifecycle {
    config: Config,
    root: CancellationToken,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in the [`LifecycleState::Starting`] state.
    pub fn new(config: Config) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            config,
            root: CancellationToken::new(),
            state,
        }
    }

    /// Root token. Every background task runs on a child of it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }

    /// Run the service until shutdown and return the exit status.
    ///
    /// `connect` yields the ready persistence backend (see [`acquire_pool`]).
    /// `shutdown_signal` resolves when the process is asked to terminate.
    pub async fn run<C, S>(self, connect: C, shutdown_signal: S) -> ExitStatus
    where
        C: Future<Output = Result<Arc<dyn Persistence>>>,
        S: Future<Output = ShutdownSignal>,
    {
        let timeout = self.config.operations_timeout;

        // Pool acquire and ping are bounded by `timeout` themselves; this outer
        // deadline only catches a connect future that never resolves.
        let connect_deadline = timeout.saturating_mul(2);
        let persistence = match tokio::time::timeout(connect_deadline, connect).await {
            Ok(Ok(persistence)) => persistence,
            Ok(Err(e)) => return self.startup_failed(e, None).await,
            Err(_) => {
                let e = Error::Connection(PersistenceError::Timeout {
                    operation: "connect",
                    after: connect_deadline,
                });
                return self.startup_failed(e, None).await;
            }
        };

        let keeper = PoolKeeper::new(
            persistence.clone(),
            PoolKeeperConfig {
                heartbeat_interval: self.config.keepalive_interval,
            },
            self.root.child_token(),
        )
        .spawn();

        if let Err(e) = with_timeout("init_schema", timeout, persistence.init_schema()).await {
            return self.startup_failed(Error::Schema(e), Some(keeper)).await;
        }
        info!("Database schema verified");

        let router_config = RouterConfig {
            body_limit: self.config.body_limit,
        };
        let router = match build_router(persistence, &router_config) {
            Ok(router) => router,
            Err(e) => return self.startup_failed(e, Some(keeper)).await,
        };

        let mut server = start_server(router, self.config.http_addr, self.root.child_token());
        self.set_state(LifecycleState::Serving);

        let trigger = tokio::select! {
            biased;

            _ = self.root.cancelled() => ShutdownTrigger::Cancelled,
            signal = shutdown_signal => ShutdownTrigger::Signal(signal),
            failure = server.failed() => ShutdownTrigger::ServerFailure(failure),
        };

        self.shutdown(trigger, server, keeper).await
    }

    async fn shutdown(
        &self,
        trigger: ShutdownTrigger,
        server: ServerHandle,
        keeper: KeeperHandle,
    ) -> ExitStatus {
        self.set_state(LifecycleState::ShuttingDown);
        let timeout = self.config.operations_timeout;

        match &trigger {
            ShutdownTrigger::Signal(signal) => info!(signal = %signal, "Shutdown signal received"),
            ShutdownTrigger::ServerFailure(Some(e)) => error!(error = %e, "HTTP server failed"),
            ShutdownTrigger::ServerFailure(None) => {
                error!("HTTP server exited without reporting a cause")
            }
            ShutdownTrigger::Cancelled => warn!("Lifecycle cancelled"),
        }
        info!("Server is shutting down...");

        let drained = server.shutdown(timeout).await.map_err(Error::from);
        if let Err(e) = &drained {
            error!(error = %e, "HTTP server shutdown failed");
        }

        keeper.request_close();
        let closed = keeper.wait(timeout).await.map_err(Error::from);
        if let Err(e) = &closed {
            error!(error = %e, "Failed to close db-pool");
        }

        self.root.cancel();
        self.set_state(LifecycleState::Stopped);

        if trigger.is_signal() && drained.is_ok() && closed.is_ok() {
            info!("Server gracefully shut down");
            ExitStatus::Success
        } else {
            error!("Server terminated, check logs for errors");
            ExitStatus::Failure
        }
    }

    async fn startup_failed(&self, err: Error, keeper: Option<KeeperHandle>) -> ExitStatus {
        error!(error = %err, "Startup failed");

        if let Some(keeper) = keeper {
            keeper.request_close();
            if let Err(e) = keeper.wait(self.config.operations_timeout).await {
                error!(error = %Error::from(e), "Failed to close db-pool");
            }
        }

        self.root.cancel();
        self.set_state(LifecycleState::Stopped);
        ExitStatus::Failure
    }
}

/// Connect to PostgreSQL using `config` and verify the connection.
pub async fn acquire_pool(config: &Config) -> Result<Arc<dyn Persistence>> {
    let options = config.connect_options()?;
    let persistence =
        PostgresPersistence::connect(options, config.max_connections, config.operations_timeout)
            .await
            .map_err(Error::Connection)?;

    let target = persistence.target();
    info!(
        host = %target.host,
        port = target.port,
        database = target.database.as_deref().unwrap_or_default(),
        user = %target.user,
        "Connected to the database"
    );

    Ok(Arc::new(persistence))
}
