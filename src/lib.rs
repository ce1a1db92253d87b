//! XFetch Cache - A persistent compute-on-miss cache
//!
//! Serves cached values until they expire, recomputing through a caller-supplied
//! provider on a miss. Probabilistic early expiration spreads recomputation of hot
//! keys over time so concurrent callers do not all miss at once.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Beta, CacheItem, CacheManager, FileStore, ItemView, MemoryStore, Store};
pub use config::Config;
pub use error::{CacheError, GetError};
pub use tasks::spawn_cleanup_task;
