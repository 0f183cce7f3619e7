// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP listener task.
//!
//! [`start_server`] returns immediately. Bind and serve failures are delivered on
//! a one-shot channel read through [`ServerHandle::failed`]; a shutdown requested
//! through the handle's token is never reported there.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, ShutdownError};

/// A running HTTP listener.
#[derive(Debug)]
pub struct ServerHandle {
    join: JoinHandle<std::io::Result<()>>,
    failures: oneshot::Receiver<Error>,
    shutdown: CancellationToken,
}

/// Spawn the HTTP listener for `router` on `addr`.
///
/// The listener drains and stops when `shutdown` (or any parent token) is cancelled.
pub fn start_server(
    router: Router,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> ServerHandle {
    let (failure_tx, failures) = oneshot::channel();
    let token = shutdown.clone();
    let stopping = shutdown.clone();

    let join = tokio::spawn(async move {
        info!(addr = %addr, "Starting HTTP server");

        let result = async move {
            let listener = TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        }
        .await;

        match result {
            Ok(()) => {
                info!(addr = %addr, "HTTP server stopped");
                Ok(())
            }
            Err(e) if !stopping.is_cancelled() => {
                error!(addr = %addr, error = %e, "HTTP server failed");
                let _ = failure_tx.send(Error::Server(e));
                Ok(())
            }
            Err(e) => Err(e),
        }
    });

    ServerHandle {
        join,
        failures,
        shutdown,
    }
}

impl ServerHandle {
    /// Wait for the listener to fail.
    ///
    /// Returns `Some(error)` for a bind or serve failure, `None` if the listener
    /// exited without reporting one. Must not be awaited again after it returns.
    pub async fn failed(&mut self) -> Option<Error> {
        (&mut self.failures).await.ok()
    }

    /// Stop accepting connections and wait up to `timeout` for in-flight
    /// requests to drain.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), ShutdownError> {
        // Stop listening for failures before the drain so it is not reported as one
        let mut failures = self.failures;
        failures.close();
        self.shutdown.cancel();

        let mut join = self.join;
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(ShutdownError::Drain(e.to_string())),
            Ok(Err(e)) => Err(ShutdownError::TaskPanicked {
                task: "HTTP server",
                reason: e.to_string(),
            }),
            Err(_) => {
                join.abort();
                Err(ShutdownError::DrainTimeout(timeout))
            }
        }
    }
}
