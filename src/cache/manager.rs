//! Cache Manager Module
//!
//! Get-or-compute orchestration: read the store, apply the expiration
//! policy, run the provider on a miss and write the result back.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::cache::{
    current_timestamp_ms, duration_to_ms, Beta, CacheEntry, CacheItem, CacheKey, CacheStats,
    ExpirationPolicy, FileStore, ItemView, Store,
};
use crate::config::Config;
use crate::error::{GetError, Result};

/// TTL applied when a provider declares no expiry and none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

// == Cache Manager ==
/// Compute-on-miss cache over a [`Store`].
///
/// Shared between threads behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct CacheManager {
    store: Arc<dyn Store>,
    policy: ExpirationPolicy,
    default_beta: Beta,
    default_ttl: Option<Duration>,
    stats: Mutex<CacheStats>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager over `store` with beta 1.0 and a 300s default TTL.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            policy: ExpirationPolicy::new(),
            default_beta: Beta::DEFAULT,
            default_ttl: Some(DEFAULT_TTL),
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Creates a manager over a [`FileStore`] rooted at `config.cache_dir`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = FileStore::open(&config.cache_dir)?;
        Ok(Self::new(Arc::new(store))
            .with_default_beta(Beta::new(config.default_beta)?)
            .with_default_ttl(config.default_expiry()))
    }

    pub fn with_policy(mut self, policy: ExpirationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Beta used when `get` is called without one.
    pub fn with_default_beta(mut self, beta: Beta) -> Self {
        self.default_beta = beta;
        self
    }

    /// TTL used when a provider declares no expiry. `None` = never expires.
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // == Get ==
    /// Returns the cached value for `key`, computing it with `provider` on a miss.
    ///
    /// A read is a miss when the entry is absent, hard-expired, cannot be
    /// decoded as `T`, or the expiration policy picks it for early refresh.
    /// `beta` falls back to the manager's default.
    ///
    /// # Errors
    /// - [`GetError::Cache`] for an invalid key; the provider does not run
    /// - [`GetError::Provider`] with the provider's own error; nothing is cached
    /// - [`GetError::NotPersisted`] with the computed value when it could not be stored
    pub fn get<T, E, F>(
        &self,
        key: &str,
        beta: Option<Beta>,
        provider: F,
    ) -> std::result::Result<T, GetError<T, E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut CacheItem) -> std::result::Result<T, E>,
    {
        let key = CacheKey::new(key)?;
        let beta = beta.unwrap_or(self.default_beta);

        let entry = self.store.read(&key);
        let now = current_timestamp_ms();
        let miss = self.policy.should_treat_as_miss(entry.as_ref(), now, beta);

        if !miss {
            if let Some(cached) = entry.as_ref() {
                match T::deserialize(&cached.value) {
                    Ok(value) => {
                        debug!("Cache hit for '{}'", key);
                        self.with_stats(|stats| stats.record_hit());
                        return Ok(value);
                    }
                    Err(e) => warn!("Cached value for '{}' does not decode: {}", key, e),
                }
            }
        }

        let early = miss && entry.as_ref().is_some_and(|e| !e.is_expired_at(now));
        debug!("Cache miss for '{}' (early refresh: {})", key, early);
        self.with_stats(|stats| stats.record_miss(early));

        let mut item = CacheItem::new(key.clone(), entry);
        let started = Instant::now();
        let value = provider(&mut item).map_err(GetError::Provider)?;
        // Every measured computation carries a cost
        let compute_ms = duration_to_ms(started.elapsed()).max(1);

        let stored = match encode_for_storage(&value) {
            Ok(stored) => stored,
            Err(e) => return Err(self.not_persisted(&key, value, e.into())),
        };
        let new_entry = CacheEntry::new(stored, item.ttl_or(self.default_ttl), compute_ms);

        match self.store.write(&key, &new_entry) {
            Ok(()) => {
                self.with_stats(|stats| stats.record_write());
                Ok(value)
            }
            Err(source) => Err(self.not_persisted(&key, value, source)),
        }
    }

    // == Get Item ==
    /// Returns a view of `key` without running a provider.
    ///
    /// Only hard expiry is applied; early expiration never affects the view.
    pub fn get_item(&self, key: &str) -> Result<ItemView> {
        let key = CacheKey::new(key)?;
        let entry = self.store.read(&key);
        Ok(ItemView::new(key.as_str(), entry))
    }

    // == Has Item ==
    /// Returns true if a live entry exists for `key`.
    pub fn has_item(&self, key: &str) -> Result<bool> {
        let key = CacheKey::new(key)?;
        Ok(self.store.exists(&key))
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key succeeds.
    ///
    /// Returns `Ok(false)` only if the store failed to remove the entry; the
    /// failure is logged.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let key = CacheKey::new(key)?;
        match self.store.delete(&key) {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("{}", e);
                Ok(false)
            }
        }
    }

    // == Prune ==
    /// Physically removes hard-expired entries from the store.
    pub fn prune_expired(&self) -> Result<usize> {
        self.store.prune_expired()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn not_persisted<T, E>(
        &self,
        key: &CacheKey,
        value: T,
        source: crate::error::CacheError,
    ) -> GetError<T, E> {
        error!("Computed value for '{}' was not cached: {}", key, source);
        self.with_stats(|stats| stats.record_write_failure());
        GetError::NotPersisted { value, source }
    }
}

/// Converts a computed value to its stored form.
///
/// Fails when the stored form would not decode back as `T`, as with non-finite
/// floats, which JSON writes as `null`.
fn encode_for_storage<T>(value: &T) -> serde_json::Result<serde_json::Value>
where
    T: Serialize + DeserializeOwned,
{
    let stored = serde_json::to_value(value)?;
    T::deserialize(&stored)?;
    Ok(stored)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::CacheError;
    use serde_json::{json, Value};
    use std::cell::Cell;
    use std::convert::Infallible;
    use std::thread::sleep;

    fn manager() -> CacheManager {
        CacheManager::new(Arc::new(MemoryStore::new()))
    }

    fn half() -> f64 {
        0.5
    }

    /// Store whose writes always fail.
    #[derive(Debug, Default)]
    struct ReadOnlyStore(MemoryStore);

    impl Store for ReadOnlyStore {
        fn read(&self, key: &CacheKey) -> Option<CacheEntry> {
            self.0.read(key)
        }

        fn write(&self, key: &CacheKey, _entry: &CacheEntry) -> Result<()> {
            Err(CacheError::StorageWrite {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn delete(&self, key: &CacheKey) -> Result<()> {
            self.0.delete(key)
        }

        fn prune_expired(&self) -> Result<usize> {
            self.0.prune_expired()
        }
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = manager();
        let calls = Cell::new(0);
        let provider = |_: &mut CacheItem| {
            calls.set(calls.get() + 1);
            Ok::<_, Infallible>("computed".to_string())
        };

        assert_eq!(cache.get("k", None, provider).unwrap(), "computed");
        assert_eq!(cache.get("k", None, provider).unwrap(), "computed");
        assert_eq!(calls.get(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.writes, 1);
    }

    #[test]
    fn test_provider_error_propagates_and_caches_nothing() {
        let cache = manager();

        let result = cache.get("k", None, |_| Err::<u32, _>("upstream down"));

        assert!(matches!(result, Err(GetError::Provider("upstream down"))));
        assert!(!cache.has_item("k").unwrap());
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_invalid_key_skips_provider() {
        let cache = manager();
        let result = cache.get("", None, |_| -> std::result::Result<u32, Infallible> {
            panic!("provider must not run")
        });
        assert!(matches!(result, Err(GetError::Cache(CacheError::InvalidKey(_)))));
    }

    #[test]
    fn test_write_failure_returns_value() {
        let cache = CacheManager::new(Arc::new(ReadOnlyStore::default()));

        let result = cache.get("k", None, |_| Ok::<_, Infallible>(42u32));

        match result {
            Err(GetError::NotPersisted { value, source }) => {
                assert_eq!(value, 42);
                assert!(matches!(source, CacheError::StorageWrite { .. }));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(cache.stats().write_failures, 1);
    }

    #[test]
    fn test_provider_expiry_is_applied() {
        let cache = manager();
        cache
            .get("k", None, |item| {
                item.expires_after(Some(Duration::from_secs(2)));
                Ok::<_, Infallible>(1u8)
            })
            .unwrap();

        let view = cache.get_item("k").unwrap();
        let entry = view.entry().unwrap();
        assert_eq!(entry.expires_at, Some(entry.created_at + 2_000));
        assert!(entry.compute_ms >= 1);
    }

    #[test]
    fn test_default_ttl_applies_when_unset() {
        let cache = manager().with_default_ttl(Some(Duration::from_secs(10)));
        cache.get("k", None, |_| Ok::<_, Infallible>(1u8)).unwrap();

        let view = cache.get_item("k").unwrap();
        let entry = view.entry().unwrap();
        assert_eq!(entry.expires_at, Some(entry.created_at + 10_000));
    }

    #[test]
    fn test_zero_ttl_is_never_a_hit() {
        let cache = manager();
        let calls = Cell::new(0);
        let provider = |item: &mut CacheItem| {
            calls.set(calls.get() + 1);
            item.expires_after_secs(-1);
            Ok::<_, Infallible>(calls.get())
        };

        assert_eq!(cache.get("k", None, provider).unwrap(), 1);
        assert!(!cache.has_item("k").unwrap());
        assert_eq!(cache.get("k", None, provider).unwrap(), 2);
    }

    #[test]
    fn test_immediate_beta_always_recomputes() {
        let cache = manager();
        cache
            .get("k", None, |item| {
                item.expires_after(Some(Duration::from_secs(60)));
                Ok::<_, Infallible>(1u32)
            })
            .unwrap();

        let value = cache
            .get("k", Some(Beta::IMMEDIATE), |_| Ok::<_, Infallible>(2u32))
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(cache.stats().early_refreshes, 1);
    }

    #[test]
    fn test_never_expiring_entry_ignores_beta() {
        let cache = manager();
        cache
            .get("k", None, |item| {
                item.expires_never();
                Ok::<_, Infallible>(1u32)
            })
            .unwrap();

        let value = cache
            .get("k", Some(Beta::IMMEDIATE), |_| Ok::<_, Infallible>(2u32))
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_large_beta_refreshes_early_and_sees_previous_value() {
        let cache = manager().with_policy(ExpirationPolicy::with_sampler(half));
        cache
            .get("k", None, |item| {
                item.expires_after(Some(Duration::from_secs(2)));
                sleep(Duration::from_millis(20));
                Ok::<_, Infallible>("v1".to_string())
            })
            .unwrap();

        let mut previous = None;
        let value = cache
            .get("k", Some(Beta::new(100_000.0).unwrap()), |item| {
                previous = item.previous_value().cloned();
                Ok::<_, Infallible>("v2".to_string())
            })
            .unwrap();

        assert_eq!(value, "v2");
        assert_eq!(previous, Some(json!("v1")));
    }

    #[test]
    fn test_undecodable_entry_is_recomputed() {
        let cache = manager();
        cache
            .get("k", None, |_| Ok::<_, Infallible>("text".to_string()))
            .unwrap();

        let value: u32 = cache.get("k", None, |_| Ok::<_, Infallible>(9)).unwrap();

        assert_eq!(value, 9);
        assert_eq!(cache.get_item("k").unwrap().get(), &json!(9));
    }

    #[test]
    fn test_non_finite_float_is_not_cached() {
        let cache = manager();
        let provider = |item: &mut CacheItem| {
            item.expires_never();
            Ok::<_, Infallible>(f64::NAN)
        };

        match cache.get("nan", Some(Beta::DISABLED), provider) {
            Err(GetError::NotPersisted { value, source }) => {
                assert!(value.is_nan());
                assert!(matches!(source, CacheError::Serialization(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!cache.has_item("nan").unwrap());
        assert_eq!(cache.stats().write_failures, 1);
        assert_eq!(cache.stats().writes, 0);
    }

    #[test]
    fn test_finite_float_is_cached() {
        let cache = manager();
        let calls = Cell::new(0);
        let provider = |_: &mut CacheItem| {
            calls.set(calls.get() + 1);
            Ok::<_, Infallible>(0.1f64 + 0.2)
        };

        assert_eq!(cache.get("sum", None, provider).unwrap(), 0.1 + 0.2);
        assert_eq!(cache.get("sum", None, provider).unwrap(), 0.1 + 0.2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cached_none_is_a_hit() {
        let cache = manager();
        let calls = Cell::new(0);
        let provider = |_: &mut CacheItem| {
            calls.set(calls.get() + 1);
            Ok::<Option<String>, Infallible>(None)
        };

        assert_eq!(cache.get("k", None, provider).unwrap(), None);
        assert_eq!(cache.get("k", None, provider).unwrap(), None);
        assert_eq!(calls.get(), 1);

        let view = cache.get_item("k").unwrap();
        assert!(view.is_hit());
        assert_eq!(view.get(), &Value::Null);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = manager();
        cache.get("k", None, |_| Ok::<_, Infallible>(1u8)).unwrap();

        assert!(cache.delete("k").unwrap());
        assert!(cache.delete("k").unwrap());
        assert!(cache.delete("never").unwrap());
        assert!(!cache.has_item("k").unwrap());
        assert!(!cache.get_item("k").unwrap().is_hit());
    }

    #[test]
    fn test_from_config_rejects_negative_beta() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            default_beta: -1.0,
            ..Config::default()
        };
        assert!(matches!(
            CacheManager::from_config(&config),
            Err(CacheError::InvalidBeta(_))
        ));
    }
}
