//! Cache Module
//!
//! Compute-on-miss caching with hard TTL expiry, probabilistic early
//! expiration and pluggable persistent storage.

mod entry;
mod file_store;
mod item;
mod key;
mod manager;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, duration_to_ms, CacheEntry};
pub use file_store::FileStore;
pub use item::{CacheItem, ItemView};
pub use key::CacheKey;
pub use manager::{CacheManager, DEFAULT_TTL};
pub use policy::{Beta, ExpirationPolicy, Sampler};
pub use stats::CacheStats;
pub use store::{MemoryStore, Store};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
