//! Cache Item Module
//!
//! The handle a provider uses to declare expiry, and the read-only view
//! returned by introspection calls.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::cache::{CacheEntry, CacheKey};

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expiry {
    /// Provider declared nothing; the manager's default TTL applies
    Unset,
    Never,
    After(Duration),
}

// == Cache Item ==
/// Mutable handle passed to a provider while it computes a value.
#[derive(Debug)]
pub struct CacheItem {
    key: CacheKey,
    previous: Option<CacheEntry>,
    expiry: Expiry,
}

impl CacheItem {
    pub(crate) fn new(key: CacheKey, previous: Option<CacheEntry>) -> Self {
        Self {
            key,
            previous,
            expiry: Expiry::Unset,
        }
    }

    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// The value being refreshed, if the miss was an early refresh of a live entry.
    pub fn previous_value(&self) -> Option<&Value> {
        self.previous.as_ref().map(|entry| &entry.value)
    }

    /// Sets the time to live of the computed value. `None` means never expires.
    ///
    /// A zero duration expires the value immediately.
    pub fn expires_after(&mut self, ttl: Option<Duration>) -> &mut Self {
        self.expiry = match ttl {
            Some(ttl) => Expiry::After(ttl),
            None => Expiry::Never,
        };
        self
    }

    /// Marks the computed value as never expiring.
    pub fn expires_never(&mut self) -> &mut Self {
        self.expires_after(None)
    }

    /// Sets the time to live from a signed number of seconds.
    ///
    /// Non-positive values expire the value immediately.
    pub fn expires_after_secs(&mut self, secs: i64) -> &mut Self {
        let ttl = match u64::try_from(secs) {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                warn!("Negative TTL {}s for '{}', expiring immediately", secs, self.key);
                Duration::ZERO
            }
        };
        self.expires_after(Some(ttl))
    }

    /// Resolves the declared expiry against the manager's default.
    pub(crate) fn ttl_or(&self, default_ttl: Option<Duration>) -> Option<Duration> {
        match self.expiry {
            Expiry::Unset => default_ttl,
            Expiry::Never => None,
            Expiry::After(ttl) => Some(ttl),
        }
    }
}

// == Item View ==
/// Read-only snapshot of a key, reflecting hard expiry only.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    key: String,
    entry: Option<CacheEntry>,
}

impl ItemView {
    pub(crate) fn new(key: impl Into<String>, entry: Option<CacheEntry>) -> Self {
        Self {
            key: key.into(),
            entry,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True if the store holds a live entry for the key.
    pub fn is_hit(&self) -> bool {
        self.entry.is_some()
    }

    /// The cached value, or `Value::Null` on a miss.
    ///
    /// A hit may also hold `Value::Null`; use [`is_hit`](Self::is_hit) to tell them apart.
    pub fn get(&self) -> &Value {
        self.entry.as_ref().map_or(&NULL, |entry| &entry.value)
    }

    /// Decodes the cached value, returning `None` on a miss or a type mismatch.
    pub fn get_as<T: DeserializeOwned>(&self) -> Option<T> {
        let entry = self.entry.as_ref()?;
        T::deserialize(&entry.value).ok()
    }

    /// The underlying entry, if any.
    pub fn entry(&self) -> Option<&CacheEntry> {
        self.entry.as_ref()
    }

    pub fn into_value(self) -> Value {
        self.entry.map_or(Value::Null, |entry| entry.value)
    }
}
