//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for cache and storage operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Beta is negative or not a number
    #[error("Invalid beta: {0}")]
    InvalidBeta(f64),

    /// Persisting an entry failed
    #[error("Failed to persist entry for key '{key}': {source}")]
    StorageWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Removing an entry failed
    #[error("Failed to delete entry for key '{key}': {source}")]
    StorageDelete {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Storage root could not be prepared or scanned
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be converted to or from its stored form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidKey(_) | CacheError::InvalidBeta(_) => StatusCode::BAD_REQUEST,
            CacheError::StorageWrite { .. }
            | CacheError::StorageDelete { .. }
            | CacheError::Io(_)
            | CacheError::Serialization(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// == Get Error ==
/// Failure of a get-or-compute call.
///
/// `T` is the cached value type, `E` the provider's error type.
#[derive(Debug)]
pub enum GetError<T, E> {
    /// The provider failed; nothing was cached.
    Provider(E),
    /// The call was rejected before the provider ran (bad key or beta).
    Cache(CacheError),
    /// The provider succeeded but the result could not be cached.
    ///
    /// The computed value is still handed back to the caller.
    NotPersisted { value: T, source: CacheError },
}

impl<T, E> GetError<T, E> {
    /// Returns the computed value if the provider itself succeeded.
    pub fn into_value(self) -> Option<T> {
        match self {
            GetError::NotPersisted { value, .. } => Some(value),
            GetError::Provider(_) | GetError::Cache(_) => None,
        }
    }

    /// Returns the provider error, if that is what failed.
    pub fn provider_error(&self) -> Option<&E> {
        match self {
            GetError::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl<T, E> From<CacheError> for GetError<T, E> {
    fn from(err: CacheError) -> Self {
        GetError::Cache(err)
    }
}

impl<T, E: fmt::Display> fmt::Display for GetError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetError::Provider(e) => write!(f, "Provider failed: {}", e),
            GetError::Cache(e) => fmt::Display::fmt(e, f),
            GetError::NotPersisted { source, .. } => {
                write!(f, "Value computed but not cached: {}", source)
            }
        }
    }
}

impl<T, E> std::error::Error for GetError<T, E>
where
    T: fmt::Debug,
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GetError::Provider(e) => Some(e),
            GetError::Cache(e) => Some(e),
            GetError::NotPersisted { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("upstream down")]
    struct UpstreamError;

    #[test]
    fn test_not_persisted_keeps_value() {
        let err: GetError<u32, UpstreamError> = GetError::NotPersisted {
            value: 7,
            source: CacheError::Internal("disk full".to_string()),
        };
        assert!(err.to_string().contains("disk full"));
        assert_eq!(err.into_value(), Some(7));
    }

    #[test]
    fn test_provider_error_has_no_value() {
        let err: GetError<u32, UpstreamError> = GetError::Provider(UpstreamError);
        assert!(err.provider_error().is_some());
        assert_eq!(err.to_string(), "Provider failed: upstream down");
        assert_eq!(err.into_value(), None);
    }

    #[test]
    fn test_invalid_key_is_bad_request() {
        let response = CacheError::InvalidKey("empty".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
