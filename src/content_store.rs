//! Content Store Abstraction
//!
//! Trait-based abstraction over blob storage for transcript content. Blobs
//! are write-once: every upload gets a fresh key, so implementations never
//! need conditional puts. Delete is idempotent — removing an absent key
//! succeeds, which keeps compensating deletes and retried deletes safe.
//!
//! Implementations:
//! - `InMemoryContentStore`: For unit tests and ephemeral engines
//! - `LocalFsContentStore`: For development and local deployments
//! - `S3ContentStore`: For production (feature-gated)

use crate::error::ContentStoreError;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

/// Content store abstraction trait.
///
/// Methods return boxed futures so the trait stays object-safe; the
/// coordinator holds stores as `Arc<dyn ContentStore>`.
pub trait ContentStore: Send + Sync + 'static {
    /// Put a blob (create or overwrite).
    fn put<'a>(
        &'a self,
        key: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>>;

    /// Get a blob's contents.
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ContentStoreError>> + Send + 'a>>;

    /// Delete a blob. Deleting an absent key is not an error.
    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>>;
}

// ============================================================================
// InMemoryContentStore - For tests and ephemeral engines
// ============================================================================

/// In-memory content store for unit tests and ephemeral engines.
#[derive(Debug)]
pub struct InMemoryContentStore {
    data: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryContentStore {
    /// Create a new in-memory content store.
    pub fn new() -> Self {
        InMemoryContentStore {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored blobs (for testing).
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if empty (for testing).
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if a key is present (for testing).
    pub fn contains(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Clear all blobs (for testing).
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryContentStore {
    fn clone(&self) -> Self {
        InMemoryContentStore {
            data: Arc::clone(&self.data),
        }
    }
}

impl ContentStore for InMemoryContentStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.data
                .write()
                .insert(key.to_string(), Bytes::copy_from_slice(data));
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.data
                .read()
                .get(key)
                .cloned()
                .ok_or_else(|| ContentStoreError::not_found(key))
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            self.data.write().remove(key);
            Ok(())
        })
    }
}

// ============================================================================
// LocalFsContentStore - For development
// ============================================================================

/// Local filesystem content store for development and local deployments.
#[derive(Debug, Clone)]
pub struct LocalFsContentStore {
    base_path: PathBuf,
}

impl LocalFsContentStore {
    /// Create a new local filesystem content store rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        LocalFsContentStore { base_path }
    }

    /// Create with a temporary directory (for tests).
    pub fn temp() -> Result<Self, ContentStoreError> {
        let temp_dir = std::env::temp_dir().join(format!(
            "transcript-store-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&temp_dir)?;
        Ok(LocalFsContentStore::new(temp_dir))
    }

    /// Get the full path for a key.
    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Ensure parent directories exist.
    fn ensure_parent(&self, path: &PathBuf) -> Result<(), ContentStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Get the base path (for testing).
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl ContentStore for LocalFsContentStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.full_path(key);
            self.ensure_parent(&path)?;
            tokio::fs::write(&path, data)
                .await
                .map_err(ContentStoreError::from)
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.full_path(key);
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(ContentStoreError::not_found(key))
                }
                Err(e) => Err(ContentStoreError::from(e)),
            }
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.full_path(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()), // Already deleted
                Err(e) => Err(ContentStoreError::from(e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreErrorKind;

    #[tokio::test]
    async fn test_inmemory_put_get() {
        let store = InMemoryContentStore::new();

        store.put("t/abc/v1/x.bin", b"hello world").await.unwrap();
        let data = store.get("t/abc/v1/x.bin").await.unwrap();

        assert_eq!(&data[..], b"hello world");
    }

    #[tokio::test]
    async fn test_inmemory_get_missing_is_not_found() {
        let store = InMemoryContentStore::new();

        let err = store.get("t/missing").await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_inmemory_delete_is_idempotent() {
        let store = InMemoryContentStore::new();

        store.put("t/abc/v1/x.bin", b"data").await.unwrap();
        store.delete("t/abc/v1/x.bin").await.unwrap();
        assert!(store.is_empty());

        // Second delete of the same key still succeeds.
        store.delete("t/abc/v1/x.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_inmemory_clones_share_data() {
        let store = InMemoryContentStore::new();
        let clone = store.clone();

        store.put("t/key", b"data").await.unwrap();
        assert!(clone.contains("t/key"));
    }

    #[tokio::test]
    async fn test_localfs_put_get_nested_keys() {
        let store = LocalFsContentStore::temp().unwrap();

        store
            .put("transcripts/abc/v1/x.bin", b"hello world")
            .await
            .unwrap();
        let data = store.get("transcripts/abc/v1/x.bin").await.unwrap();

        assert_eq!(&data[..], b"hello world");

        // Cleanup
        std::fs::remove_dir_all(store.base_path()).ok();
    }

    #[tokio::test]
    async fn test_localfs_get_missing_is_not_found() {
        let store = LocalFsContentStore::temp().unwrap();

        let err = store.get("transcripts/missing.bin").await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);

        // Cleanup
        std::fs::remove_dir_all(store.base_path()).ok();
    }

    #[tokio::test]
    async fn test_localfs_delete_is_idempotent() {
        let store = LocalFsContentStore::temp().unwrap();

        store.put("transcripts/abc/v1/x.bin", b"data").await.unwrap();
        store.delete("transcripts/abc/v1/x.bin").await.unwrap();
        store.delete("transcripts/abc/v1/x.bin").await.unwrap();

        let err = store.get("transcripts/abc/v1/x.bin").await.unwrap_err();
        assert!(err.is_not_found());

        // Cleanup
        std::fs::remove_dir_all(store.base_path()).ok();
    }
}
