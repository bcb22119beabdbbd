//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Peek or drain on a frontier with no hashes.
    #[error("Hash frontier is empty")]
    EmptyFrontier,

    /// Non-blocking pop on a queue with no blocks.
    #[error("Block queue is empty")]
    EmptyQueue,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Encoding or decoding a stored value failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Corruption detected.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// No position left below the front or above the back of a tree.
    #[error("Position key space exhausted")]
    KeySpaceExhausted,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
