//! API Handlers
//!
//! HTTP request handlers for the cache inspection endpoints.
//!
//! Store access is filesystem I/O, so every cache call runs on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::CacheManager;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, ExistsResponse, HealthResponse, ItemResponse, PruneResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache
    pub cache: Arc<CacheManager>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: CacheManager) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Opens a file store at the configured cache directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(CacheManager::from_config(config)?))
    }
}

/// Runs a cache call on the blocking thread pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Internal(format!("Cache task failed: {}", e)))?
}

/// Handler for GET /item/:key
///
/// Returns the cached value without computing anything. Misses are not errors.
pub async fn item_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ItemResponse>> {
    let cache = state.cache.clone();
    let view = run_blocking(move || cache.get_item(&key)).await?;

    Ok(Json(ItemResponse::from(view)))
}

/// Handler for GET /has/:key
pub async fn has_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ExistsResponse>> {
    let cache = state.cache.clone();
    let lookup = key.clone();
    let exists = run_blocking(move || cache.has_item(&lookup)).await?;

    Ok(Json(ExistsResponse::new(key, exists)))
}

/// Handler for DELETE /item/:key
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let cache = state.cache.clone();
    let target = key.clone();
    let deleted = run_blocking(move || cache.delete(&target)).await?;

    if !deleted {
        return Err(CacheError::Internal(format!(
            "Failed to delete key '{}'",
            key
        )));
    }
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /prune
///
/// Runs a reclamation sweep immediately.
pub async fn prune_handler(State(state): State<AppState>) -> Result<Json<PruneResponse>> {
    let cache = state.cache.clone();
    let removed = run_blocking(move || cache.prune_expired()).await?;

    Ok(Json(PruneResponse { removed }))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use serde_json::json;
    use std::convert::Infallible;
    use std::time::Duration;

    fn state() -> AppState {
        AppState::new(CacheManager::new(Arc::new(MemoryStore::new())))
    }

    #[tokio::test]
    async fn test_item_handler_hit_and_miss() {
        let state = state();
        state
            .cache
            .get("test_key", None, |_| Ok::<_, Infallible>("test_value".to_string()))
            .unwrap();

        let response = item_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert!(response.hit);
        assert_eq!(response.value, json!("test_value"));

        let response = item_handler(State(state), Path("missing".to_string()))
            .await
            .unwrap();
        assert!(!response.hit);
        assert_eq!(response.value, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_item_handler_rejects_oversized_key() {
        let key = "x".repeat(crate::cache::MAX_KEY_LENGTH + 1);
        let result = item_handler(State(state()), Path(key)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_has_and_delete_handlers() {
        let state = state();
        state
            .cache
            .get("to_delete", None, |_| Ok::<_, Infallible>(1))
            .unwrap();

        let response = has_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(response.exists);

        delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();
        // Idempotent
        delete_handler(State(state.clone()), Path("to_delete".to_string()))
            .await
            .unwrap();

        let response = has_handler(State(state), Path("to_delete".to_string()))
            .await
            .unwrap();
        assert!(!response.exists);
    }

    #[tokio::test]
    async fn test_prune_handler() {
        let state = state();
        state
            .cache
            .get("gone", None, |item| {
                item.expires_after(Some(Duration::ZERO));
                Ok::<_, Infallible>(1)
            })
            .unwrap();

        let response = prune_handler(State(state)).await.unwrap();
        assert_eq!(response.removed, 1);
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let response = stats_handler(State(state())).await;
        assert_eq!(response.hits, 0);
        assert_eq!(response.misses, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
