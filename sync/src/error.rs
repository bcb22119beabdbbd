//! Errors surfaced by the sync queue facade.

use storage::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Nothing left to fetch. Not a failure from the peer layer's view.
    #[error("Hash frontier is empty")]
    EmptyFrontier,

    #[error("Block queue is empty")]
    EmptyQueue,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    /// The import worker needs a Tokio runtime to run on.
    #[error("No Tokio runtime: {0}")]
    Runtime(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmptyFrontier => SyncError::EmptyFrontier,
            StoreError::EmptyQueue => SyncError::EmptyQueue,
            other => SyncError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
