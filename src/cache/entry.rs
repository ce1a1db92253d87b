//! Cache Entry Module
//!
//! Defines the record stored for each key: the computed value and its timing metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A computed value with creation and expiry metadata.
///
/// Entries are never mutated after being written; recomputation replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored value. `Value::Null` is a legitimate cached value.
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Wall-clock cost of the computation that produced `value`, in milliseconds
    #[serde(default)]
    pub compute_ms: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry timestamped now.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Time to live, `None` = never expires
    /// * `compute_ms` - How long the value took to compute
    pub fn new(value: Value, ttl: Option<Duration>, compute_ms: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            expires_at: ttl.map(|ttl| now.saturating_add(duration_to_ms(ttl))),
            compute_ms,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has hard-expired at `now_ms`.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// the expiration time. Entries without expiry never expire.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }

    /// Checks if the entry has hard-expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Returns true if the entry was written without an expiry.
    pub fn never_expires(&self) -> bool {
        self.expires_at.is_none()
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        let now = current_timestamp_ms();
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_ms)
        .unwrap_or(0)
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
