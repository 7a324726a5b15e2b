//! Fault-Injecting Store Wrappers
//!
//! Deterministic wrappers around the store traits for failure-path testing.
//! Faults are scripted, not probabilistic: "fail the next N calls" makes
//! saga compensation and abort paths reproducible without seeds. Both
//! wrappers also count operations, so tests can assert that a rejected
//! request never reached a store.

use crate::content_store::ContentStore;
use crate::error::{ContentStoreError, MetadataStoreError, StoreErrorKind};
use crate::metadata_store::MetadataStore;
use crate::query::{Page, SearchFilter};
use crate::types::{ProcessingStatus, TranscriptMetadata};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Operation counts observed by a wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOpStats {
    pub puts: u64,
    pub gets: u64,
    pub deletes: u64,
    pub inserts: u64,
    pub searches: u64,
}

// ============================================================================
// FaultyContentStore
// ============================================================================

#[derive(Default)]
struct ContentFaults {
    fail_puts: u32,
    fail_gets: u32,
    fail_deletes: u32,
    stats: StoreOpStats,
}

/// Content store wrapper with scripted fault injection.
pub struct FaultyContentStore<S: ContentStore> {
    inner: S,
    state: Arc<Mutex<ContentFaults>>,
}

impl<S: ContentStore> FaultyContentStore<S> {
    pub fn new(inner: S) -> Self {
        FaultyContentStore {
            inner,
            state: Arc::new(Mutex::new(ContentFaults::default())),
        }
    }

    /// Fail the next `n` puts with an unavailable error.
    pub fn fail_next_puts(&self, n: u32) {
        self.state.lock().fail_puts = n;
    }

    /// Fail the next `n` gets with an unavailable error.
    pub fn fail_next_gets(&self, n: u32) {
        self.state.lock().fail_gets = n;
    }

    /// Fail the next `n` deletes with an unavailable error.
    pub fn fail_next_deletes(&self, n: u32) {
        self.state.lock().fail_deletes = n;
    }

    /// Current operation counts.
    pub fn stats(&self) -> StoreOpStats {
        self.state.lock().stats
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn injected(op: &str) -> ContentStoreError {
    ContentStoreError::new(StoreErrorKind::Unavailable, format!("injected {} failure", op))
}

/// Decrement a scripted fault counter, reporting whether to fail this call.
fn take_fault(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

impl<S: ContentStore> ContentStore for FaultyContentStore<S> {
    fn put<'a>(
        &'a self,
        key: &'a str,
        data: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.stats.puts += 1;
                if take_fault(&mut state.fail_puts) {
                    return Err(injected("put"));
                }
            }
            self.inner.put(key, data).await
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.stats.gets += 1;
                if take_fault(&mut state.fail_gets) {
                    return Err(injected("get"));
                }
            }
            self.inner.get(key).await
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ContentStoreError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.stats.deletes += 1;
                if take_fault(&mut state.fail_deletes) {
                    return Err(injected("delete"));
                }
            }
            self.inner.delete(key).await
        })
    }
}

// ============================================================================
// FaultyMetadataStore
// ============================================================================

#[derive(Default)]
struct MetadataFaults {
    fail_inserts: u32,
    duplicate_inserts: u32,
    fail_deletes: u32,
    stats: StoreOpStats,
}

/// Metadata store wrapper with scripted fault injection.
///
/// `duplicate_next_inserts` forges the version race: the wrapped store is
/// never touched and the insert reports `DuplicateVersion`, exactly what a
/// loser of a real (source_id, version) race observes.
pub struct FaultyMetadataStore<S: MetadataStore> {
    inner: S,
    state: Arc<Mutex<MetadataFaults>>,
}

impl<S: MetadataStore> FaultyMetadataStore<S> {
    pub fn new(inner: S) -> Self {
        FaultyMetadataStore {
            inner,
            state: Arc::new(Mutex::new(MetadataFaults::default())),
        }
    }

    /// Fail the next `n` inserts with an unavailable backend error.
    pub fn fail_next_inserts(&self, n: u32) {
        self.state.lock().fail_inserts = n;
    }

    /// Make the next `n` inserts lose the version race.
    pub fn duplicate_next_inserts(&self, n: u32) {
        self.state.lock().duplicate_inserts = n;
    }

    /// Fail the next `n` record deletes with an unavailable backend error.
    pub fn fail_next_deletes(&self, n: u32) {
        self.state.lock().fail_deletes = n;
    }

    /// Current operation counts.
    pub fn stats(&self) -> StoreOpStats {
        self.state.lock().stats
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn backend_injected(op: &str) -> MetadataStoreError {
    MetadataStoreError::backend(
        StoreErrorKind::Unavailable,
        format!("injected {} failure", op),
    )
}

impl<S: MetadataStore> MetadataStore for FaultyMetadataStore<S> {
    fn insert<'a>(
        &'a self,
        record: &'a TranscriptMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.stats.inserts += 1;
                if take_fault(&mut state.duplicate_inserts) {
                    return Err(MetadataStoreError::DuplicateVersion {
                        source_id: record.source_id.clone(),
                        version: record.version,
                    });
                }
                if take_fault(&mut state.fail_inserts) {
                    return Err(backend_injected("insert"));
                }
            }
            self.inner.insert(record).await
        })
    }

    fn max_version<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, MetadataStoreError>> + Send + 'a>> {
        self.inner.max_version(source_id)
    }

    fn get<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        self.inner.get(source_id, version)
    }

    fn latest<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        self.inner.latest(source_id)
    }

    fn list_versions<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        self.inner.list_versions(source_id)
    }

    fn update_status<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
        status: ProcessingStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        self.inner.update_status(source_id, version, status, completed_at)
    }

    fn delete<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<bool, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut state = self.state.lock();
                state.stats.deletes += 1;
                if take_fault(&mut state.fail_deletes) {
                    return Err(backend_injected("delete"));
                }
            }
            self.inner.delete(source_id, version).await
        })
    }

    fn delete_all<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, MetadataStoreError>> + Send + 'a>> {
        self.inner.delete_all(source_id)
    }

    fn search<'a>(
        &'a self,
        filter: &'a SearchFilter,
        page: Page,
    ) -> Pin<
        Box<dyn Future<Output = Result<(Vec<TranscriptMetadata>, u64), MetadataStoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            self.state.lock().stats.searches += 1;
            self.inner.search(filter, page).await
        })
    }
}
