// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for kvbox-server.
//!
//! The service talks to storage only through [`Persistence`]: a liveness ping,
//! schema setup, a keyed lookup, a conflict-skipping insert and a close. The
//! PostgreSQL backend is used in production; the in-memory backend serves tests.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryPersistence;
pub use self::postgres::{ConnectionTarget, PostgresPersistence};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PersistenceError {
    /// The underlying database driver reported an error.
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    /// The operation did not complete within its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The pool has been closed; no further operations are accepted.
    #[error("connection pool is closed")]
    Closed,

    /// The backend could not be reached.
    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Whether this error represents an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Database(sqlx::Error::PoolTimedOut)
        )
    }
}

/// Storage operations the service needs.
///
/// Implementations are shared by every request handler. Only the pool keeper
/// calls [`close`](Persistence::close).
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), PersistenceError>;

    /// Create the items table if it does not exist.
    async fn init_schema(&self) -> Result<(), PersistenceError>;

    /// Look up the value stored under `key`. `Ok(None)` means not found.
    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Insert `key` → `value` unless `key` already exists.
    ///
    /// Returns the number of rows affected: `1` for a new key, `0` when the
    /// insert was skipped because the key was already present.
    async fn insert_item(&self, key: &str, value: &str) -> Result<u64, PersistenceError>;

    /// Close the backend. Subsequent operations fail with [`PersistenceError::Closed`].
    async fn close(&self);

    /// Whether [`close`](Persistence::close) has completed.
    fn is_closed(&self) -> bool;
}

/// Run `fut` with a deadline, mapping an elapsed deadline to [`PersistenceError::Timeout`].
pub async fn with_timeout<T, F>(
    operation: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, PersistenceError>
where
    F: Future<Output = Result<T, PersistenceError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(PersistenceError::Timeout { operation, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapsed() {
        let result: Result<(), _> = with_timeout("ping", Duration::from_secs(15), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "ping timed out after 15s");
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout("get_item", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = with_timeout::<(), _>("get_item", Duration::from_secs(1), async {
            Err(PersistenceError::Closed)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PersistenceError::Closed));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_pool_timeout_counts_as_timeout() {
        let err = PersistenceError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_timeout());
    }
}
