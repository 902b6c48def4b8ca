//! Blob publisher.
//!
//! This crate provides:
//! - Directory uploads to a blob container
//! - Retention of the most recent log directories
//! - The HTML index page linking the latest blobs
//! - The run log documenting each publishing run
//! - Orchestration of a complete publishing run

pub mod config;
pub mod error;
pub mod index;
pub mod pruner;
pub mod publisher;
pub mod run_log;
pub mod timestamp;
pub mod uploader;

pub use config::PublisherConfig;
pub use error::{PublishError, PublishResult};
pub use publisher::{PublishReport, Publisher};
pub use run_log::RunLog;
pub use timestamp::RunTimestamp;
