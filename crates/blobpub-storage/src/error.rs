//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Container operation failed: {0}")]
    ContainerFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Invalid blob name: {0}")]
    InvalidKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn container_failed(msg: impl Into<String>) -> Self {
        Self::ContainerFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    pub fn list_failed(msg: impl Into<String>) -> Self {
        Self::ListFailed(msg.into())
    }

    /// Build an error from a non-success Azure response.
    pub(crate) fn from_status(
        make: fn(String) -> Self,
        operation: &str,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Self {
        make(format!("Azure {}: HTTP {} - {}", operation, status, body.trim()))
    }
}
