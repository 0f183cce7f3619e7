// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgPool};
use tracing::{debug, warn};

use super::{Persistence, PersistenceError, with_timeout};

/// Schema applied on startup.
pub const SCHEMA: &str = include_str!("../../migrations/schema.sql");

/// PostgreSQL-backed persistence implementation.
///
/// Every operation is bounded by `operation_timeout`.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
    operation_timeout: Duration,
}

impl fmt::Debug for PostgresPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresPersistence")
            .field("target", &self.target())
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

/// Where the pool connects, for logging. Never includes the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Server host or socket directory.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name, if set.
    pub database: Option<String>,
    /// Role used to connect.
    pub user: String,
}

impl PostgresPersistence {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, operation_timeout: Duration) -> Self {
        Self {
            pool,
            operation_timeout,
        }
    }

    /// Build a pool from `options` and verify it with a ping.
    ///
    /// On ping failure the partially constructed pool is closed before the
    /// error is returned.
    pub async fn connect(
        options: PgConnectOptions,
        max_connections: u32,
        operation_timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(operation_timeout)
            .connect_lazy_with(options);

        let persistence = Self::new(pool, operation_timeout);

        if let Err(e) = persistence.ping().await {
            warn!(error = %e, "Database ping failed, closing pool");
            persistence.pool.close().await;
            return Err(e);
        }

        Ok(persistence)
    }

    /// Connection parameters the pool was built with.
    pub fn target(&self) -> ConnectionTarget {
        let options = self.pool.connect_options();
        ConnectionTarget {
            host: options.get_host().to_string(),
            port: options.get_port(),
            database: options.get_database().map(str::to_string),
            user: options.get_username().to_string(),
        }
    }

    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.pool.is_closed() {
            return Err(PersistenceError::Closed);
        }
        Ok(())
    }
}

fn map_sqlx(err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::PoolClosed => PersistenceError::Closed,
        other => PersistenceError::Database(other),
    }
}

#[async_trait]
impl Persistence for PostgresPersistence {
    async fn ping(&self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        with_timeout("ping", self.operation_timeout, async {
            let mut conn = self.pool.acquire().await.map_err(map_sqlx)?;
            conn.ping().await.map_err(map_sqlx)
        })
        .await
    }

    async fn init_schema(&self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        with_timeout("init_schema", self.operation_timeout, async {
            sqlx::raw_sql(SCHEMA)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
            Ok(())
        })
        .await
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.ensure_open()?;
        with_timeout("get_item", self.operation_timeout, async {
            let value: Option<Option<String>> =
                sqlx::query_scalar("SELECT value FROM data WHERE id = $1")
                    .bind(key)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx)?;
            // A NULL value column reads as an empty string
            Ok(value.map(Option::unwrap_or_default))
        })
        .await
    }

    async fn insert_item(&self, key: &str, value: &str) -> Result<u64, PersistenceError> {
        self.ensure_open()?;
        with_timeout("insert_item", self.operation_timeout, async {
            let result = sqlx::query(
                "INSERT INTO data (id, value) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn close(&self) {
        debug!(
            size = self.pool.size(),
            idle = self.pool.num_idle(),
            "Closing PostgreSQL pool"
        );
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}
