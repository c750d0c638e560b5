//! Error types for the snapshot store.
//!
//! [`DbError`] wraps the underlying [`fred`] and [`serde_json`] errors and
//! converts into the store-agnostic
//! [`StoreError`](economy_core::store::StoreError) at the trait boundary.

use economy_core::store::StoreError;

/// Errors that can occur talking to `Dragonfly`.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Serialization(e) => Self::Serialization(e),
            other => Self::Backend(other.to_string()),
        }
    }
}
