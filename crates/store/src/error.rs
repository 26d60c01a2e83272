//! Error types for local persistence

use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while persisting cart data
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to write a store file
    #[error("Failed to write store file at {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to remove a store file
    #[error("Failed to remove store file at {path}: {source}")]
    RemoveError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the store directory
    #[error("Failed to create store directory at {path}: {source}")]
    DirectoryCreationError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize a value
    #[error("Failed to serialize store value: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// The backing medium refused the write
    #[error("Store is unavailable: {0}")]
    Unavailable(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<StoreError> for cartsync_core::CartError {
    fn from(err: StoreError) -> Self {
        cartsync_core::CartError::storage("Failed to persist cart", err)
    }
}
