//! Response models for the cache inspection API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{
    DeleteResponse, ErrorResponse, ExistsResponse, HealthResponse, ItemResponse, PruneResponse,
    StatsResponse,
};
