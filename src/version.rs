//! Advisory version allocation.
//!
//! `next_version` is a read, not a reservation: two concurrent uploads for
//! one source may compute the same candidate. The metadata store's
//! uniqueness constraint on (source_id, version) settles the race at insert
//! time; the loser surfaces a version conflict and may retry the whole
//! upload. The allocator itself holds no state, so histories stay dense
//! (1..=N) without coordination.

use crate::error::MetadataStoreError;
use crate::metadata_store::MetadataStore;
use std::sync::Arc;

/// Computes candidate version numbers from the metadata index.
#[derive(Clone)]
pub struct VersionAllocator {
    metadata: Arc<dyn MetadataStore>,
}

impl VersionAllocator {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        VersionAllocator { metadata }
    }

    /// Candidate version for the next upload of a source: one past the
    /// highest committed version, 1 for a brand-new source.
    pub async fn next_version(&self, source_id: &str) -> Result<u32, MetadataStoreError> {
        let max = self.metadata.max_version(source_id).await?;
        Ok(max + 1)
    }
}

impl std::fmt::Debug for VersionAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionAllocator").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_store::InMemoryMetadataStore;
    use crate::types::{ProcessingStatus, TranscriptFormat, TranscriptMetadata};
    use chrono::DateTime;

    fn record(source_id: &str, version: u32) -> TranscriptMetadata {
        TranscriptMetadata {
            source_id: source_id.to_string(),
            version,
            title: "t".to_string(),
            date: "2024-05-17".to_string(),
            speakers: vec![],
            format: TranscriptFormat::Text,
            tags: None,
            processing_status: ProcessingStatus::Pending,
            uploaded_at: DateTime::from_timestamp_millis(1_000).unwrap(),
            processing_completed_at: None,
            blob_key: "k".to_string(),
            url: "u".to_string(),
            size: 0,
        }
    }

    #[tokio::test]
    async fn test_new_source_starts_at_one() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let allocator = VersionAllocator::new(store);
        assert_eq!(allocator.next_version("fresh").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_next_is_max_plus_one() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.insert(&record("abc", 1)).await.unwrap();
        store.insert(&record("abc", 2)).await.unwrap();
        store.insert(&record("abc", 3)).await.unwrap();

        let allocator = VersionAllocator::new(store);
        assert_eq!(allocator.next_version("abc").await.unwrap(), 4);
        // Other sources are unaffected.
        assert_eq!(allocator.next_version("xyz").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_gap_after_delete_is_not_refilled() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.insert(&record("abc", 1)).await.unwrap();
        store.insert(&record("abc", 2)).await.unwrap();
        store.insert(&record("abc", 3)).await.unwrap();
        store.delete("abc", 2).await.unwrap();

        let allocator = VersionAllocator::new(store);
        // max is still 3; the hole at v2 stays a hole.
        assert_eq!(allocator.next_version("abc").await.unwrap(), 4);
    }
}
