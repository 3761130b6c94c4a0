//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted queue snapshot could not be parsed.
    #[error("queue snapshot corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store lock.
    #[error("store at {path} is locked by another process")]
    Locked {
        /// Path of the contended store.
        path: String,
    },

    /// Serialization of an entry or snapshot failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
