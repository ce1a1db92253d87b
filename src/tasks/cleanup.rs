//! Expired Entry Sweep Task
//!
//! Background task that periodically reclaims hard-expired records from the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::CacheManager;

/// Spawns a background task that periodically prunes expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps. Each sweep runs on the blocking pool since it walks the
/// storage directory.
///
/// # Arguments
/// * `cache` - Shared cache whose store is swept
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheManager::from_config(&config)?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<CacheManager>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expired entry sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let cache = cache.clone();
            match tokio::task::spawn_blocking(move || cache.prune_expired()).await {
                Ok(Ok(removed)) if removed > 0 => {
                    info!("Sweep: removed {} expired entries", removed);
                }
                Ok(Ok(_)) => debug!("Sweep: no expired entries found"),
                Ok(Err(e)) => error!("Sweep failed: {}", e),
                Err(e) => error!("Sweep task panicked: {}", e),
            }
        }
    })
}
