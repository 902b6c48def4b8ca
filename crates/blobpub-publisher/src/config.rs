//! Publisher configuration.

use std::path::PathBuf;

use crate::error::{PublishError, PublishResult};

/// Publisher configuration.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Local directory whose files are published under `data_prefix`
    pub data_dir: PathBuf,
    /// Local directory whose files are published under `logs_prefix/<timestamp>`
    pub logs_dir: PathBuf,
    /// Blob prefix for data files
    pub data_prefix: String,
    /// Blob prefix for log directories
    pub logs_prefix: String,
    /// Number of log directories kept after a run, including the new one
    pub max_log_directories: usize,
    /// Maximum uploads in flight per directory
    pub max_concurrent_uploads: usize,
    /// File name of the run log, written into `logs_dir`
    pub run_log_name: String,
    /// Blob name of the index page
    pub index_blob: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            logs_dir: PathBuf::from("logs"),
            data_prefix: "data".to_string(),
            logs_prefix: "logs".to_string(),
            max_log_directories: 5,
            max_concurrent_uploads: 16,
            run_log_name: "upload-blobs.md".to_string(),
            index_blob: "index.html".to_string(),
        }
    }
}

impl PublisherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> PublishResult<Self> {
        let defaults = Self::default();
        let config = Self {
            data_dir: std::env::var("PUBLISH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            logs_dir: std::env::var("PUBLISH_LOGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.logs_dir),
            data_prefix: std::env::var("PUBLISH_DATA_PREFIX").unwrap_or(defaults.data_prefix),
            logs_prefix: std::env::var("PUBLISH_LOGS_PREFIX").unwrap_or(defaults.logs_prefix),
            max_log_directories: parse_var("PUBLISH_MAX_LOG_DIRS", defaults.max_log_directories)?,
            max_concurrent_uploads: parse_var(
                "PUBLISH_MAX_CONCURRENT_UPLOADS",
                defaults.max_concurrent_uploads,
            )?,
            run_log_name: std::env::var("PUBLISH_RUN_LOG_NAME").unwrap_or(defaults.run_log_name),
            index_blob: std::env::var("PUBLISH_INDEX_BLOB").unwrap_or(defaults.index_blob),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a run misbehave.
    pub fn validate(&self) -> PublishResult<()> {
        if self.max_log_directories == 0 {
            return Err(PublishError::config(
                "PUBLISH_MAX_LOG_DIRS must be at least 1 to keep the current run's logs",
            ));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(PublishError::config(
                "PUBLISH_MAX_CONCURRENT_UPLOADS must be at least 1",
            ));
        }
        if self.logs_prefix.trim_matches('/').is_empty() {
            return Err(PublishError::config(
                "PUBLISH_LOGS_PREFIX must not be empty; pruning would touch every blob",
            ));
        }
        if self.run_log_name.is_empty() || self.run_log_name.contains('/') {
            return Err(PublishError::config(format!(
                "PUBLISH_RUN_LOG_NAME must be a plain file name, got {:?}",
                self.run_log_name
            )));
        }
        if self.index_blob.is_empty() {
            return Err(PublishError::config("PUBLISH_INDEX_BLOB must not be empty"));
        }
        Ok(())
    }

    /// Logs prefix with exactly one trailing slash, e.g. `logs/`.
    pub fn logs_listing_prefix(&self) -> String {
        format!("{}/", self.logs_prefix.trim_end_matches('/'))
    }
}

fn parse_var(name: &str, default: usize) -> PublishResult<usize> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            PublishError::config(format!(
                "{} must be a non-negative integer, got {:?}",
                name, value
            ))
        }),
        Err(_) => Ok(default),
    }
}
