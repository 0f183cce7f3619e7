// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for kvbox-server.
//!
//! [`Error`] covers process-level failures (startup and shutdown). Per-request
//! failures are expressed as [`ApiError`](crate::handlers::ApiError) and never
//! leave the handler.

use std::time::Duration;

use thiserror::Error;

use crate::persistence::PersistenceError;

/// Service errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Pool construction or the liveness ping failed.
    #[error("Connection error: {0}")]
    Connection(#[source] PersistenceError),

    /// Schema initialization failed.
    #[error("Schema error: {0}")]
    Schema(#[source] PersistenceError),

    /// The HTTP handler set could not be wired.
    #[error("Router error: {0}")]
    Router(String),

    /// The HTTP listener failed to bind or stopped serving unexpectedly.
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// A resource failed to close cleanly.
    #[error("Shutdown error: {0}")]
    Shutdown(#[from] ShutdownError),
}

/// Failures while releasing resources during shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The listener did not drain within the timeout.
    #[error("HTTP listener did not drain within {0:?}")]
    DrainTimeout(Duration),

    /// The listener task returned an error while draining.
    #[error("HTTP listener failed while draining: {0}")]
    Drain(String),

    /// The pool keeper did not confirm the close within the timeout.
    #[error("connection pool did not close within {0:?}")]
    PoolCloseTimeout(Duration),

    /// A background task panicked.
    #[error("{task} task panicked: {reason}")]
    TaskPanicked {
        /// Which task.
        task: &'static str,
        /// Join error text.
        reason: String,
    },
}

/// Result type using the service [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
