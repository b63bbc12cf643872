//! Error types for Arbor Core

use thiserror::Error;

/// Result type alias using Arbor's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Arbor error types
///
/// Query problems are reported inside a [`crate::Statement`]; these errors are
/// for callers that drive the store directly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid node name: {0:?}")]
    InvalidNodeName(String),

    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Value of {0} spans more than one line")]
    MultilineValue(String),

    #[error("Store is not empty: {0} nodes present")]
    StoreNotEmpty(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
