//! Storage error types

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record on line {line}: {content:?}")]
    Malformed { line: usize, content: String },

    #[error("Store error: {0}")]
    Store(#[from] arbor_core::Error),

    #[error("Database task is closed")]
    Closed,
}
