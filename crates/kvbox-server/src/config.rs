// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for kvbox-server.

use std::net::SocketAddr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Default HTTP listener port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Default bound for database operations, schema setup, listener drain and pool close.
pub const DEFAULT_OPERATIONS_TIMEOUT: Duration = Duration::from_secs(15);

/// Default interval between pool keeper heartbeats.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default request body limit in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener address.
    pub http_addr: SocketAddr,
    /// Optional connection URL. When absent, the standard `PG*` variables are used.
    pub database_url: Option<String>,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Bound applied to every database operation and shutdown step.
    pub operations_timeout: Duration,
    /// How often the pool keeper emits a heartbeat while waiting.
    pub keepalive_interval: Duration,
    /// Maximum accepted request body size.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            operations_timeout: DEFAULT_OPERATIONS_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `KVBOX_HTTP_PORT`: HTTP listener port (default: 8000)
    /// - `KVBOX_OPERATIONS_TIMEOUT_SECS`: operation timeout (default: 15)
    /// - `KVBOX_KEEPALIVE_INTERVAL_SECS`: pool keeper heartbeat (default: 5)
    /// - `KVBOX_DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `KVBOX_BODY_LIMIT_BYTES`: request body limit (default: 65536)
    /// - `KVBOX_DATABASE_URL`: overrides `PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = parse_var(
            "KVBOX_HTTP_PORT",
            DEFAULT_HTTP_PORT,
            "must be a valid port number",
        )?;

        let timeout_secs: u64 = parse_var(
            "KVBOX_OPERATIONS_TIMEOUT_SECS",
            DEFAULT_OPERATIONS_TIMEOUT.as_secs(),
            "must be a positive number of seconds",
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "KVBOX_OPERATIONS_TIMEOUT_SECS",
                "must be a positive number of seconds",
            ));
        }

        let keepalive_secs: u64 = parse_var(
            "KVBOX_KEEPALIVE_INTERVAL_SECS",
            DEFAULT_KEEPALIVE_INTERVAL.as_secs(),
            "must be a positive number of seconds",
        )?;
        if keepalive_secs == 0 {
            return Err(ConfigError::Invalid(
                "KVBOX_KEEPALIVE_INTERVAL_SECS",
                "must be a positive number of seconds",
            ));
        }

        let max_connections: u32 = parse_var(
            "KVBOX_DB_MAX_CONNECTIONS",
            DEFAULT_MAX_CONNECTIONS,
            "must be a positive integer",
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid(
                "KVBOX_DB_MAX_CONNECTIONS",
                "must be a positive integer",
            ));
        }

        let body_limit: usize = parse_var(
            "KVBOX_BODY_LIMIT_BYTES",
            DEFAULT_BODY_LIMIT,
            "must be a number of bytes",
        )?;

        let database_url = std::env::var("KVBOX_DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            database_url,
            max_connections,
            operations_timeout: Duration::from_secs(timeout_secs),
            keepalive_interval: Duration::from_secs(keepalive_secs),
            body_limit,
        })
    }

    /// Build PostgreSQL connect options.
    ///
    /// Without `KVBOX_DATABASE_URL`, sqlx reads the libpq environment
    /// (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`, ...).
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match &self.database_url {
            Some(url) => url
                .parse()
                .map_err(|e: sqlx::Error| ConfigError::InvalidDatabaseUrl(e.to_string())),
            None => Ok(PgConnectOptions::new()),
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name, reason)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// The database URL could not be parsed.
    #[error("invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
}
