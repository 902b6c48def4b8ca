//! Blob container abstraction.
//!
//! The publisher only needs a handful of container operations, so they are
//! collected behind [`BlobContainer`]. [`crate::AzureContainer`] talks to Azure
//! Blob Storage; `MemoryContainer` (feature `test-util`) keeps blobs in memory.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Anonymous read access granted on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAccess {
    /// No anonymous access.
    Private,
    /// Anonymous read access to blobs, but not to container listings.
    Blob,
    /// Anonymous read access to blobs and container listings.
    Container,
}

impl PublicAccess {
    /// Value of the `x-ms-blob-public-access` header, if any.
    pub fn header_value(&self) -> Option<&'static str> {
        match self {
            PublicAccess::Private => None,
            PublicAccess::Blob => Some("blob"),
            PublicAccess::Container => Some("container"),
        }
    }
}

/// A single CORS rule applied to the blob service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub max_age_secs: u32,
}

impl CorsRule {
    /// Allow `GET` from any origin, cached for one day.
    pub fn public_read() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string()],
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            max_age_secs: 60 * 60 * 24,
        }
    }
}

/// Information about a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Full blob name, e.g. `logs/2020-01-01T00-00-00.000Z/upload-blobs.md`
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

/// Join a container URL and a blob name, percent-encoding each path segment.
pub fn blob_url(container_url: &str, name: &str) -> String {
    let encoded: Vec<_> = name.split('/').map(urlencoding::encode).collect();
    format!("{}/{}", container_url.trim_end_matches('/'), encoded.join("/"))
}

/// Operations the publisher performs against a blob container.
#[async_trait]
pub trait BlobContainer: Send + Sync {
    /// Create the container if it does not exist yet.
    async fn ensure_created(&self, access: PublicAccess) -> StorageResult<()>;

    /// Replace the blob service CORS rules.
    async fn set_cors(&self, rules: &[CorsRule]) -> StorageResult<()>;

    /// Upload a local file, overwriting any existing blob of the same name.
    async fn create_blob_from_file(
        &self,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Upload literal text, overwriting any existing blob of the same name.
    async fn create_blob_from_text(
        &self,
        name: &str,
        text: &str,
        content_type: &str,
    ) -> StorageResult<()>;

    /// List every blob whose name starts with `prefix`.
    async fn list_blobs(&self, prefix: &str) -> StorageResult<Vec<BlobInfo>>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn delete_blob(&self, name: &str) -> StorageResult<()>;

    /// Public URL of a blob. Pure; does not check that the blob exists.
    fn url_of_blob(&self, name: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_access_header() {
        assert_eq!(PublicAccess::Private.header_value(), None);
        assert_eq!(PublicAccess::Blob.header_value(), Some("blob"));
        assert_eq!(PublicAccess::Container.header_value(), Some("container"));
    }

    #[test]
    fn test_public_read_cors_rule() {
        let rule = CorsRule::public_read();
        assert_eq!(rule.allowed_origins, vec!["*"]);
        assert_eq!(rule.allowed_methods, vec!["GET"]);
        assert!(rule.allowed_headers.is_empty());
        assert_eq!(rule.max_age_secs, 86_400);
    }

    #[test]
    fn test_blob_url_encodes_segments() {
        let base = "https://acct.blob.core.windows.net/pub";
        assert_eq!(
            blob_url(base, "data/a.json"),
            "https://acct.blob.core.windows.net/pub/data/a.json"
        );
        assert_eq!(
            blob_url(base, "data/a b#1.json"),
            "https://acct.blob.core.windows.net/pub/data/a%20b%231.json"
        );
        assert_eq!(
            blob_url("http://127.0.0.1:10000/devstoreaccount1/pub/", "index.html"),
            "http://127.0.0.1:10000/devstoreaccount1/pub/index.html"
        );
    }
}
