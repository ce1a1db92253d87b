//! Cache Store Module
//!
//! The storage contract the cache manager relies on, plus an in-memory backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheKey};
use crate::error::Result;

// == Store Trait ==
/// Durable key to entry mapping.
///
/// Implementations must guarantee:
/// - `read` never returns a hard-expired, corrupt or partially written record
/// - `write` replaces the previous record atomically; readers see the old
///   record or the new one, never a mix
/// - `delete` is idempotent
pub trait Store: Send + Sync + fmt::Debug {
    /// Returns the live entry for `key`, or `None` if absent, corrupt or expired.
    fn read(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Atomically stores `entry` under `key`.
    fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&self, key: &CacheKey) -> Result<()>;

    /// Returns true if `read` would return an entry.
    fn exists(&self, key: &CacheKey) -> bool {
        self.read(key).is_some()
    }

    /// Physically removes hard-expired records.
    ///
    /// Returns the number of records removed.
    fn prune_expired(&self) -> Result<usize>;
}

// == Memory Store ==
/// In-process store backed by a `HashMap`.
///
/// Provides the same visibility guarantees as a persistent store but does
/// not survive restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;

        if entry.is_expired() {
            debug!("Entry '{}' has expired", key);
            return None;
        }
        Some(entry.clone())
    }

    fn write(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), entry.clone());
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn exists(&self, key: &CacheKey) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    fn prune_expired(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        Ok(before - entries.len())
    }
}
