// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory persistence.
//!
//! All access goes through a single mutex, so concurrent handlers observe the
//! same first-write-wins semantics as the PostgreSQL backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Persistence, PersistenceError};

/// Mutex-guarded map implementing [`Persistence`].
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    items: Mutex<HashMap<String, String>>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    schema_ready: AtomicBool,
}

impl MemoryPersistence {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// Whether the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times [`close`](Persistence::close) was called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether [`init_schema`](Persistence::init_schema) has run.
    pub fn schema_ready(&self) -> bool {
        self.schema_ready.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PersistenceError::Closed);
        }
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, PersistenceError> {
        self.items
            .lock()
            .map_err(|_| PersistenceError::Unavailable("item map lock poisoned".to_string()))
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn ping(&self) -> Result<(), PersistenceError> {
        self.ensure_open()
    }

    async fn init_schema(&self) -> Result<(), PersistenceError> {
        self.ensure_open()?;
        self.schema_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.ensure_open()?;
        Ok(self.lock()?.get(key).cloned())
    }

    async fn insert_item(&self, key: &str, value: &str) -> Result<u64, PersistenceError> {
        self.ensure_open()?;
        let mut items = self.lock()?;
        if items.contains_key(key) {
            return Ok(0);
        }
        items.insert(key.to_string(), value.to_string());
        Ok(1)
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
