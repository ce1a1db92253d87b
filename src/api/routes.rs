//! API Routes
//!
//! Configures the Axum router with all cache inspection endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, has_handler, health_handler, item_handler, prune_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /item/:key` - Inspect a cached value
/// - `DELETE /item/:key` - Delete a key
/// - `GET /has/:key` - Check whether a live entry exists
/// - `POST /prune` - Reclaim expired entries now
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/item/:key", get(item_handler).delete(delete_handler))
        .route("/has/:key", get(has_handler))
        .route("/prune", post(prune_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
