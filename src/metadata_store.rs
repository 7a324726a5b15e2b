//! Metadata Store Abstraction
//!
//! Trait-based abstraction over the metadata index. Records are keyed by
//! (source_id, version) and that pair carries a uniqueness constraint —
//! `insert` refusing a duplicate is the engine's only serialization point
//! for concurrent uploads of one source.
//!
//! Implementations:
//! - `InMemoryMetadataStore`: For unit tests and ephemeral engines
//! - `SqliteMetadataStore`: For development and production (`sqlite_store`)

use crate::error::MetadataStoreError;
use crate::query::{Page, SearchFilter};
use crate::types::{ProcessingStatus, TranscriptMetadata};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Metadata store abstraction trait.
///
/// Search operates on the latest-version projection: the highest version of
/// each source, with older versions invisible. The returned total counts
/// every projected match, independent of the page window.
pub trait MetadataStore: Send + Sync + 'static {
    /// Insert a new record. Fails with `DuplicateVersion` when the
    /// (source_id, version) pair is already committed.
    fn insert<'a>(
        &'a self,
        record: &'a TranscriptMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), MetadataStoreError>> + Send + 'a>>;

    /// Highest stored version for a source, 0 when none exist.
    fn max_version<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, MetadataStoreError>> + Send + 'a>>;

    /// Fetch one record.
    fn get<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>;

    /// Fetch the highest-version record for a source.
    fn latest<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>;

    /// All records for a source, newest version first.
    fn list_versions<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>;

    /// Patch the processing status and completion stamp of one record.
    /// Returns the updated record, or `None` when it does not exist.
    fn update_status<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
        status: ProcessingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>;

    /// Delete one record. True when a record was removed.
    fn delete<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<bool, MetadataStoreError>> + Send + 'a>>;

    /// Delete every record for a source, returning how many were removed.
    fn delete_all<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, MetadataStoreError>> + Send + 'a>>;

    /// Filter and page the latest-version projection. An empty filter is a
    /// plain listing.
    fn search<'a>(
        &'a self,
        filter: &'a SearchFilter,
        page: Page,
    ) -> Pin<
        Box<dyn Future<Output = Result<(Vec<TranscriptMetadata>, u64), MetadataStoreError>> + Send + 'a>,
    >;
}

/// Whether a record satisfies every supplied predicate.
///
/// Shared semantics for all in-process filtering; the SQL backend mirrors
/// this clause for clause. Title matching folds ASCII case only, the same
/// folding SQLite's `lower()` applies.
pub(crate) fn matches_filter(filter: &SearchFilter, record: &TranscriptMetadata) -> bool {
    if let Some(title) = &filter.title {
        if !record
            .title
            .to_ascii_lowercase()
            .contains(&title.to_ascii_lowercase())
        {
            return false;
        }
    }
    if let Some(speaker) = &filter.speaker {
        if !record.speakers.iter().any(|s| s == speaker) {
            return false;
        }
    }
    if let Some(tag) = &filter.tag {
        match &record.tags {
            Some(tags) if tags.contains(tag) => {}
            _ => return false,
        }
    }
    // Canonical dates compare lexicographically; both bounds inclusive.
    if let Some(from) = &filter.date_from {
        if record.date.as_str() < from.as_str() {
            return false;
        }
    }
    if let Some(to) = &filter.date_to {
        if record.date.as_str() > to.as_str() {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if record.processing_status != status {
            return false;
        }
    }
    true
}

/// Listing order: newest upload first, source id as tie-break.
pub(crate) fn listing_order(a: &TranscriptMetadata, b: &TranscriptMetadata) -> std::cmp::Ordering {
    b.uploaded_at
        .cmp(&a.uploaded_at)
        .then_with(|| a.source_id.cmp(&b.source_id))
}

// ============================================================================
// InMemoryMetadataStore - For tests and ephemeral engines
// ============================================================================

/// In-memory metadata store for unit tests and ephemeral engines.
///
/// Versions per source live in a `BTreeMap`, so "latest" is the last entry.
#[derive(Debug)]
pub struct InMemoryMetadataStore {
    data: Arc<RwLock<HashMap<String, BTreeMap<u32, TranscriptMetadata>>>>,
}

impl InMemoryMetadataStore {
    /// Create a new in-memory metadata store.
    pub fn new() -> Self {
        InMemoryMetadataStore {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total number of records across all sources (for testing).
    pub fn len(&self) -> usize {
        self.data.read().values().map(|v| v.len()).sum()
    }

    /// Check if empty (for testing).
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Clear all records (for testing).
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryMetadataStore {
    fn clone(&self) -> Self {
        InMemoryMetadataStore {
            data: Arc::clone(&self.data),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn insert<'a>(
        &'a self,
        record: &'a TranscriptMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = self.data.write();
            let versions = data.entry(record.source_id.clone()).or_default();
            if versions.contains_key(&record.version) {
                return Err(MetadataStoreError::DuplicateVersion {
                    source_id: record.source_id.clone(),
                    version: record.version,
                });
            }
            versions.insert(record.version, record.clone());
            Ok(())
        })
    }

    fn max_version<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let data = self.data.read();
            Ok(data
                .get(source_id)
                .and_then(|versions| versions.last_key_value())
                .map(|(v, _)| *v)
                .unwrap_or(0))
        })
    }

    fn get<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let data = self.data.read();
            Ok(data
                .get(source_id)
                .and_then(|versions| versions.get(&version))
                .cloned())
        })
    }

    fn latest<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let data = self.data.read();
            Ok(data
                .get(source_id)
                .and_then(|versions| versions.last_key_value())
                .map(|(_, record)| record.clone()))
        })
    }

    fn list_versions<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let data = self.data.read();
            Ok(data
                .get(source_id)
                .map(|versions| versions.values().rev().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn update_status<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
        status: ProcessingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let mut data = self.data.write();
            let record = data
                .get_mut(source_id)
                .and_then(|versions| versions.get_mut(&version));
            Ok(record.map(|r| {
                r.processing_status = status;
                r.processing_completed_at = completed_at;
                r.clone()
            }))
        })
    }

    fn delete<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<bool, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = self.data.write();
            let removed = match data.get_mut(source_id) {
                Some(versions) => versions.remove(&version).is_some(),
                None => false,
            };
            // Drop the source entry once its history is empty.
            if data.get(source_id).is_some_and(|v| v.is_empty()) {
                data.remove(source_id);
            }
            Ok(removed)
        })
    }

    fn delete_all<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = self.data.write();
            Ok(data
                .remove(source_id)
                .map(|versions| versions.len() as u64)
                .unwrap_or(0))
        })
    }

    fn search<'a>(
        &'a self,
        filter: &'a SearchFilter,
        page: Page,
    ) -> Pin<
        Box<dyn Future<Output = Result<(Vec<TranscriptMetadata>, u64), MetadataStoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let data = self.data.read();
            let mut latest: Vec<TranscriptMetadata> = data
                .values()
                .filter_map(|versions| versions.last_key_value())
                .map(|(_, record)| record)
                .filter(|record| matches_filter(filter, record))
                .cloned()
                .collect();

            latest.sort_by(|a, b| listing_order(a, b));
            let total = latest.len() as u64;
            let items: Vec<TranscriptMetadata> = latest
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .collect();
            Ok((items, total))
        })
    }
}
