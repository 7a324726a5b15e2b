//! Versioned Transcript Storage
//!
//! Stores transcript documents as immutable content blobs in an object
//! store plus one metadata record per version in a relational index, and
//! keeps the two in agreement under concurrent writers. Sequential uploads
//! of one source yield dense versions (1..=N); deletions may leave holes,
//! which are never refilled. The uniqueness constraint on
//! (source_id, version) in the metadata index is the engine's only
//! serialization point.
//!
//! ## Architecture
//!
//! ```text
//! upload → validate → allocate version → put blob → insert record
//!                                            ↑           |
//!                                            └── delete ←┘ (on failure)
//! ```
//!
//! ## Key Features
//!
//! - **Optimistic versioning**: advisory max+1 reads, losers get a
//!   version conflict and retry
//! - **Compensating saga**: a failed metadata insert deletes the
//!   just-written blob, best effort
//! - **Ordered deletes**: blob first, record second, so a failed delete
//!   stays retryable
//! - **Latest projection**: listing and search see only the highest
//!   version of each source

pub mod config;
pub mod content_store;
pub mod coordinator;
pub mod error;
pub mod fault;
pub mod keys;
pub mod metadata_store;
pub mod query;
#[cfg(feature = "s3")]
pub mod s3_store;
pub mod sqlite_store;
pub mod types;
pub mod validate;
pub mod version;

pub use config::{connect, ConfigError, ContentBackend, MetadataBackend, StoreConfig};
pub use content_store::{ContentStore, InMemoryContentStore, LocalFsContentStore};
pub use coordinator::TranscriptStore;
pub use error::{ContentStoreError, MetadataStoreError, StorageError, StoreErrorKind, Violation};
pub use fault::{FaultyContentStore, FaultyMetadataStore, StoreOpStats};
pub use keys::BlobKeyGenerator;
pub use metadata_store::{InMemoryMetadataStore, MetadataStore};
pub use query::{Page, SearchFilter, SearchQuery, DEFAULT_LIMIT};
pub use sqlite_store::SqliteMetadataStore;
pub use types::{
    ProcessingStatus, TranscriptDocument, TranscriptFormat, TranscriptMetadata, TranscriptPage,
    UploadMetadata, UploadReceipt,
};
pub use validate::{validate_upload, ValidUpload};
pub use version::VersionAllocator;
#[cfg(feature = "s3")]
pub use s3_store::S3ContentStore;
#[cfg(feature = "s3")]
pub use config::S3Config;
