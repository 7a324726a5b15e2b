//! Consistency Coordinator
//!
//! `TranscriptStore` keeps the content store and the metadata index in
//! agreement under concurrent writers without shared state: any number of
//! coordinator instances may point at the same stores.
//!
//! Upload flow:
//! 1. Validate metadata shape (every violation reported, nothing written)
//! 2. Mint a source id if the caller did not supply one
//! 3. Compute the candidate version (advisory read)
//! 4. Generate a fresh blob key and write the content
//! 5. Insert the metadata record — the uniqueness constraint on
//!    (source_id, version) is the only serialization point
//! 6. On insert failure, best-effort delete of the just-written blob, then
//!    surface the original error
//!
//! Content writes happen before metadata writes, so a metadata record never
//! points at a blob that was not yet written. Deletes run the other way
//! around: blob first, record second, so a failed delete leaves the record
//! (and with it the blob key) behind for a retry instead of orphaning the
//! blob.

use crate::content_store::ContentStore;
use crate::error::{MetadataStoreError, StorageError};
use crate::keys::BlobKeyGenerator;
use crate::metadata_store::MetadataStore;
use crate::query::{Page, SearchFilter, SearchQuery};
use crate::types::{
    ProcessingStatus, TranscriptDocument, TranscriptMetadata, TranscriptPage, UploadMetadata,
    UploadReceipt,
};
use crate::validate::validate_upload;
use crate::version::VersionAllocator;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Coordinator over one content store and one metadata store.
pub struct TranscriptStore {
    content: Arc<dyn ContentStore>,
    metadata: Arc<dyn MetadataStore>,
    allocator: VersionAllocator,
    keygen: BlobKeyGenerator,
}

impl TranscriptStore {
    /// Build a coordinator from explicit store handles.
    pub fn new(
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
        keygen: BlobKeyGenerator,
    ) -> Self {
        let allocator = VersionAllocator::new(Arc::clone(&metadata));
        TranscriptStore {
            content,
            metadata,
            allocator,
            keygen,
        }
    }

    /// Store a new version of a transcript.
    ///
    /// Losing the version race surfaces as `VersionConflict`; the upload as
    /// a whole is safe to retry, nothing of the failed attempt remains
    /// visible.
    pub async fn upload(
        &self,
        content: Bytes,
        metadata: UploadMetadata,
    ) -> Result<UploadReceipt, StorageError> {
        let valid = validate_upload(&metadata).map_err(StorageError::Validation)?;
        let source_id = valid
            .source_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let version = self
            .allocator
            .next_version(&source_id)
            .await
            .map_err(StorageError::from)?;
        let key = self.keygen.generate(&source_id, version);

        self.content
            .put(&key, &content)
            .await
            .map_err(StorageError::ContentStore)?;

        let record = TranscriptMetadata {
            source_id: source_id.clone(),
            version,
            title: valid.title,
            date: valid.date,
            speakers: valid.speakers,
            format: valid.format,
            tags: valid.tags,
            processing_status: ProcessingStatus::Pending,
            uploaded_at: now_millis(),
            processing_completed_at: None,
            blob_key: key.clone(),
            url: self.keygen.url_for(&key),
            size: content.len() as u64,
        };

        if let Err(e) = self.metadata.insert(&record).await {
            self.compensate_orphan(&key).await;
            return Err(match e {
                MetadataStoreError::DuplicateVersion { source_id, version } => {
                    warn!("version race lost for {} v{}", source_id, version);
                    StorageError::VersionConflict { source_id, version }
                }
                other => StorageError::MetadataStore(other),
            });
        }

        info!(
            "stored transcript {} v{} ({} bytes)",
            source_id, version, record.size
        );

        Ok(UploadReceipt {
            url: record.url.clone(),
            blob_key: record.blob_key.clone(),
            metadata: record,
        })
    }

    /// Best-effort delete of a blob whose metadata insert failed. Failure is
    /// logged, never raised: the insert error is what the caller must see.
    async fn compensate_orphan(&self, key: &str) {
        if let Err(e) = self.content.delete(key).await {
            error!("failed to delete orphaned blob {}: {}", key, e);
        }
    }

    /// Fetch content and metadata for one version, or the latest version
    /// when `version` is `None`.
    pub async fn get(
        &self,
        source_id: &str,
        version: Option<u32>,
    ) -> Result<TranscriptDocument, StorageError> {
        let record = match version {
            Some(v) => self.metadata.get(source_id, v).await,
            None => self.metadata.latest(source_id).await,
        }
        .map_err(StorageError::from)?
        .ok_or_else(|| StorageError::not_found(source_id, version))?;

        let content = self
            .content
            .get(&record.blob_key)
            .await
            .map_err(StorageError::ContentStore)?;
        Ok(TranscriptDocument {
            content,
            metadata: record,
        })
    }

    /// Change the processing status of one version.
    ///
    /// Moving to `processed` stamps the completion time; moving anywhere
    /// else clears it.
    pub async fn update_status(
        &self,
        source_id: &str,
        version: u32,
        status: ProcessingStatus,
    ) -> Result<TranscriptMetadata, StorageError> {
        let completed_at = match status {
            ProcessingStatus::Processed => Some(now_millis()),
            ProcessingStatus::Pending | ProcessingStatus::Failed => None,
        };
        self.metadata
            .update_status(source_id, version, status, completed_at)
            .await
            .map_err(StorageError::from)?
            .ok_or_else(|| StorageError::not_found(source_id, Some(version)))
    }

    /// Every version of one source, newest first. Empty for an unknown
    /// source.
    pub async fn list_versions(
        &self,
        source_id: &str,
    ) -> Result<Vec<TranscriptMetadata>, StorageError> {
        self.metadata
            .list_versions(source_id)
            .await
            .map_err(StorageError::from)
    }

    /// Page through the latest version of every source, newest upload first.
    pub async fn list(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<TranscriptPage, StorageError> {
        let page = Page::new(limit, offset).map_err(StorageError::Validation)?;
        let (items, total) = self
            .metadata
            .search(&SearchFilter::default(), page)
            .await
            .map_err(StorageError::from)?;
        Ok(TranscriptPage { items, total })
    }

    /// Search the latest version of every source. Predicates combine with
    /// AND; an empty query behaves like `list`.
    pub async fn search(&self, query: SearchQuery) -> Result<TranscriptPage, StorageError> {
        let (filter, page) = query.into_filter().map_err(StorageError::Validation)?;
        let (items, total) = self
            .metadata
            .search(&filter, page)
            .await
            .map_err(StorageError::from)?;
        Ok(TranscriptPage { items, total })
    }

    /// Delete one version: blob first, record second.
    pub async fn delete_version(&self, source_id: &str, version: u32) -> Result<(), StorageError> {
        let record = self
            .metadata
            .get(source_id, version)
            .await
            .map_err(StorageError::from)?
            .ok_or_else(|| StorageError::not_found(source_id, Some(version)))?;
        self.delete_record(&record).await
    }

    /// Delete every version of a source, oldest blob keys and all. Unknown
    /// sources are a no-op. Stops at the first failure; the remaining
    /// versions stay intact and a retry picks them up.
    pub async fn delete_all(&self, source_id: &str) -> Result<(), StorageError> {
        let records = self
            .metadata
            .list_versions(source_id)
            .await
            .map_err(StorageError::from)?;
        for record in &records {
            self.delete_record(record).await?;
        }
        Ok(())
    }

    /// Two-step delete. The blob must be gone (or already absent) before
    /// the record is removed; a failed blob delete leaves the record in
    /// place so the operation stays retryable instead of orphaning a blob
    /// nothing references.
    async fn delete_record(&self, record: &TranscriptMetadata) -> Result<(), StorageError> {
        self.content
            .delete(&record.blob_key)
            .await
            .map_err(StorageError::ContentStore)?;
        self.metadata
            .delete(&record.source_id, record.version)
            .await
            .map_err(StorageError::from)?;
        info!("deleted transcript {} v{}", record.source_id, record.version);
        Ok(())
    }
}

impl std::fmt::Debug for TranscriptStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptStore")
            .field("prefix", &self.keygen.prefix())
            .finish()
    }
}

/// Current time truncated to whole milliseconds, so a timestamp survives
/// the millisecond-integer round trip through the metadata index unchanged.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
