// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! kvbox - Key-Value HTTP Service
//!
//! A minimal service that stores and retrieves string values under string keys in
//! PostgreSQL. Inserts skip conflicting keys, so the first write for a key wins.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HTTP Clients                          │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   kvbox-server (This Crate)                  │
//! │                          Port 8000                           │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐    │
//! │  │  Lifecycle  │──▶│   Server    │──▶│    Handlers      │    │
//! │  │ Coordinator │   │ (listener)  │   │  GET / POST      │    │
//! │  └──────┬──────┘   └─────────────┘   └────────┬─────────┘    │
//! │         │          ┌─────────────┐            │              │
//! │         └─────────▶│ Pool Keeper │            │              │
//! │                    └──────┬──────┘            │              │
//! └───────────────────────────┼───────────────────┼──────────────┘
//!                             │ close             │ query
//!                             ▼                   ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         PostgreSQL                           │
//! │                    data (id, value)                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # HTTP API
//!
//! | Route | Body | Responses |
//! |-------|------|-----------|
//! | `GET /{item_id}` | - | `200 {"value": ...}`, `404`, `500 {"error": ...}` |
//! | `POST /` | `{"item_id": ..., "value": ...}` | `201` new, `200` existing, `400`, `500` |
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──connect, schema, router, listen──▶ Serving
//!     │                                            │
//!     │ startup error          signal, listener failure, cancel
//!     │                                            ▼
//!     │                                      ShuttingDown
//!     │                                   drain ▶ close pool ▶ join
//!     ▼                                            │
//! Stopped ◀────────────────────────────────────────┘
//! ```
//!
//! Exit status is success only for a signal-triggered shutdown in which the
//! listener drained and the pool closed within the operations timeout.
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE` | No | libpq defaults | Connection parameters |
//! | `KVBOX_DATABASE_URL` | No | - | Connection URL overriding the `PG*` variables |
//! | `KVBOX_HTTP_PORT` | No | `8000` | HTTP listener port |
//! | `KVBOX_OPERATIONS_TIMEOUT_SECS` | No | `15` | Bound for DB operations and shutdown steps |
//! | `KVBOX_KEEPALIVE_INTERVAL_SECS` | No | `5` | Pool keeper heartbeat interval |
//! | `KVBOX_DB_MAX_CONNECTIONS` | No | `10` | Pool size |
//! | `KVBOX_BODY_LIMIT_BYTES` | No | `65536` | Request body limit |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Process-level error types
//! - [`handlers`]: Item routes
//! - [`lifecycle`]: Startup and graceful shutdown
//! - [`persistence`]: Storage trait with PostgreSQL and in-memory backends
//! - [`pool_keeper`]: Background task that closes the pool
//! - [`server`]: HTTP listener task
//! - [`signal`]: OS termination signals

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for startup and shutdown.
pub mod error;

/// HTTP handlers for items.
pub mod handlers;

/// Startup order and the graceful shutdown sequence.
pub mod lifecycle;

/// Storage trait and backends.
pub mod persistence;

/// Background worker owning the pool close.
pub mod pool_keeper;

/// HTTP listener task.
pub mod server;

/// OS termination signals.
pub mod signal;

pub use config::Config;
pub use error::{Error, Result, ShutdownError};
pub use lifecycle::{ExitStatus, Lifecycle, LifecycleState, acquire_pool};
pub use persistence::{MemoryPersistence, Persistence, PersistenceError, PostgresPersistence};
pub use signal::{ShutdownSignal, SignalListener};
