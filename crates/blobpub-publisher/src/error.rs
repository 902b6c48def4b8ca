//! Publisher error types.

use thiserror::Error;

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid run timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Listed blob {name} does not start with prefix {prefix}")]
    UnexpectedBlobName { prefix: String, name: String },

    #[error("Storage error: {0}")]
    Storage(#[from] blobpub_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_timestamp(msg: impl Into<String>) -> Self {
        Self::InvalidTimestamp(msg.into())
    }
}
