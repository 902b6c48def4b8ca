//! Azure Blob Storage container client.
//!
//! This crate provides:
//! - The `BlobContainer` trait the publisher is written against
//! - An Azure Blob Storage implementation on `azure_storage_blobs`
//! - Shared Key / SAS authorisation for the blob service CORS request
//! - An in-memory container for tests (feature `test-util`)

pub mod auth;
pub mod client;
pub mod container;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod xml;

pub use auth::AzureCredential;
pub use client::{AzureConfig, AzureContainer};
pub use container::{blob_url, BlobContainer, BlobInfo, CorsRule, PublicAccess};
pub use error::{StorageError, StorageResult};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryContainer;
