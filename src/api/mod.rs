//! API Module
//!
//! HTTP handlers and routing for inspecting a running cache.
//!
//! # Endpoints
//! - `GET /item/:key` - Inspect a cached value
//! - `DELETE /item/:key` - Delete a key
//! - `GET /has/:key` - Check whether a live entry exists
//! - `POST /prune` - Reclaim expired entries now
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
