//! In-memory blob container.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::container::{blob_url, BlobContainer, BlobInfo, CorsRule, PublicAccess};
use crate::error::{StorageError, StorageResult};

/// Base URL used by [`MemoryContainer::url_of_blob`].
pub const MEMORY_BASE_URL: &str = "https://memory.blob.local/container";

/// A blob stored in a [`MemoryContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub content: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct State {
    created: Option<PublicAccess>,
    cors: Vec<CorsRule>,
    blobs: BTreeMap<String, StoredBlob>,
    deleted: Vec<String>,
}

/// Container that keeps blobs in a sorted map.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    state: Mutex<State>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without going through the trait.
    pub fn insert(&self, name: &str, content: &str) {
        self.lock().blobs.insert(
            name.to_string(),
            StoredBlob {
                content: content.as_bytes().to_vec(),
                content_type: "text/plain".to_string(),
            },
        );
    }

    pub fn blob(&self, name: &str) -> Option<StoredBlob> {
        self.lock().blobs.get(name).cloned()
    }

    /// Blob content as UTF-8 text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.blob(name)
            .map(|blob| String::from_utf8_lossy(&blob.content).into_owned())
    }

    /// All blob names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.lock().blobs.keys().cloned().collect()
    }

    /// Names passed to `delete_blob`, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    pub fn public_access(&self) -> Option<PublicAccess> {
        self.lock().created
    }

    pub fn cors_rules(&self) -> Vec<CorsRule> {
        self.lock().cors.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn put(&self, name: &str, content: Vec<u8>, content_type: &str) -> StorageResult<()> {
        if name.is_empty() || name.starts_with('/') {
            return Err(StorageError::InvalidKey(name.to_string()));
        }
        self.lock().blobs.insert(
            name.to_string(),
            StoredBlob {
                content,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl BlobContainer for MemoryContainer {
    async fn ensure_created(&self, access: PublicAccess) -> StorageResult<()> {
        let mut state = self.lock();
        if state.created.is_none() {
            state.created = Some(access);
        }
        Ok(())
    }

    async fn set_cors(&self, rules: &[CorsRule]) -> StorageResult<()> {
        self.lock().cors = rules.to_vec();
        Ok(())
    }

    async fn create_blob_from_file(
        &self,
        name: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let content = tokio::fs::read(path).await?;
        self.put(name, content, content_type)
    }

    async fn create_blob_from_text(
        &self,
        name: &str,
        text: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        self.put(name, text.as_bytes().to_vec(), content_type)
    }

    async fn list_blobs(&self, prefix: &str) -> StorageResult<Vec<BlobInfo>> {
        Ok(self
            .lock()
            .blobs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, blob)| BlobInfo {
                name: name.clone(),
                size: blob.content.len() as u64,
            })
            .collect())
    }

    async fn delete_blob(&self, name: &str) -> StorageResult<()> {
        let mut state = self.lock();
        state.blobs.remove(name);
        state.deleted.push(name.to_string());
        Ok(())
    }

    fn url_of_blob(&self, name: &str) -> String {
        blob_url(MEMORY_BASE_URL, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_by_prefix() {
        let container = MemoryContainer::new();
        container.insert("data/a.json", "{}");
        container.insert("logs/1/x.md", "x");
        container.insert("logs/2/y.md", "yy");
        container.insert("logsX", "z");

        let blobs = tokio_test::block_on(container.list_blobs("logs/")).unwrap();
        let names: Vec<_> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["logs/1/x.md", "logs/2/y.md"]);
        assert_eq!(blobs[1].size, 2);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let container = MemoryContainer::new();
        tokio_test::block_on(container.delete_blob("nope")).unwrap();
        assert_eq!(container.deleted(), vec!["nope"]);
    }

    #[tokio::test]
    async fn test_upload_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, b"[1]").unwrap();

        let container = MemoryContainer::new();
        container
            .create_blob_from_file("data/a.json", &path, "application/json")
            .await
            .unwrap();

        let blob = container.blob("data/a.json").unwrap();
        assert_eq!(blob.content, b"[1]");
        assert_eq!(blob.content_type, "application/json");
        assert_eq!(
            container.url_of_blob("data/a.json"),
            "https://memory.blob.local/container/data/a.json"
        );
    }

    #[tokio::test]
    async fn test_ensure_created_keeps_first_access_level() {
        let container = MemoryContainer::new();
        container.ensure_created(PublicAccess::Blob).await.unwrap();
        container.ensure_created(PublicAccess::Private).await.unwrap();
        assert_eq!(container.public_access(), Some(PublicAccess::Blob));
    }

    #[tokio::test]
    async fn test_rejects_invalid_names() {
        let container = MemoryContainer::new();
        let result = container.create_blob_from_text("/abs", "x", "text/plain").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
