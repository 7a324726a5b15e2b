//! Error taxonomy for the storage engine.
//!
//! Validation errors never touch a store; store adapters sub-classify their
//! backend failures into [`StoreErrorKind`]; the coordinator surfaces every
//! error to the caller unchanged (no in-core retries). The one recovery the
//! engine performs itself — the compensating blob delete after a failed
//! metadata insert — logs its own failure instead of raising it.

use std::io::{Error as IoError, ErrorKind};

/// A single field-level validation violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field the violation applies to (e.g. `title`, `dateFrom`).
    pub field: String,
    /// What was wrong with it.
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Adapter-level classification of a backend failure.
///
/// Both store adapters map their underlying errors onto this one set so
/// callers never have to inspect backend-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The backend reported the object/record as missing.
    NotFound,
    /// Credentials were rejected or access was denied.
    Unauthorized,
    /// The backend is out of space or over a usage limit.
    QuotaExceeded,
    /// The backend could not be reached or timed out.
    Unavailable,
    /// Anything the adapter could not classify.
    Unknown,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::Unauthorized => "unauthorized",
            StoreErrorKind::QuotaExceeded => "quota exceeded",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Unknown => "unknown",
        }
    }

    /// Classify a std::io error kind.
    pub fn from_io_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => StoreErrorKind::NotFound,
            ErrorKind::PermissionDenied => StoreErrorKind::Unauthorized,
            ErrorKind::TimedOut
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => StoreErrorKind::Unavailable,
            _ => StoreErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from the content store adapter.
#[derive(Debug, Clone)]
pub struct ContentStoreError {
    /// Adapter classification of the failure.
    pub kind: StoreErrorKind,
    /// Backend-specific detail.
    pub message: String,
}

impl ContentStoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        ContentStoreError {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(key: &str) -> Self {
        ContentStoreError::new(StoreErrorKind::NotFound, format!("blob not found: {}", key))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

impl std::fmt::Display for ContentStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "content store error ({}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ContentStoreError {}

impl From<IoError> for ContentStoreError {
    fn from(e: IoError) -> Self {
        ContentStoreError::new(StoreErrorKind::from_io_kind(e.kind()), e.to_string())
    }
}

/// Error from the metadata store adapter.
#[derive(Debug, Clone)]
pub enum MetadataStoreError {
    /// The (source_id, version) pair already exists — a concurrent writer
    /// committed this version first.
    DuplicateVersion { source_id: String, version: u32 },
    /// Any other backend failure, sub-classified.
    Backend {
        kind: StoreErrorKind,
        message: String,
    },
}

impl MetadataStoreError {
    pub fn backend(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        MetadataStoreError::Backend {
            kind,
            message: message.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, MetadataStoreError::DuplicateVersion { .. })
    }
}

impl std::fmt::Display for MetadataStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataStoreError::DuplicateVersion { source_id, version } => {
                write!(f, "duplicate version: {} v{}", source_id, version)
            }
            MetadataStoreError::Backend { kind, message } => {
                write!(f, "metadata store error ({}): {}", kind, message)
            }
        }
    }
}

impl std::error::Error for MetadataStoreError {}

/// Top-level error surfaced by the coordinator and query engine.
#[derive(Debug)]
pub enum StorageError {
    /// Malformed metadata, pagination, or search predicates. Carries every
    /// violation found, not just the first; no store was touched.
    Validation(Vec<Violation>),
    /// Unknown source_id/version on get, update, or delete.
    NotFound {
        source_id: String,
        version: Option<u32>,
    },
    /// Lost the insert race for (source_id, version); the caller may retry
    /// the whole upload.
    VersionConflict { source_id: String, version: u32 },
    /// Wrapped content store failure.
    ContentStore(ContentStoreError),
    /// Wrapped metadata store failure.
    MetadataStore(MetadataStoreError),
}

impl StorageError {
    pub fn not_found(source_id: impl Into<String>, version: Option<u32>) -> Self {
        StorageError::NotFound {
            source_id: source_id.into(),
            version,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StorageError::Validation(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::VersionConflict { .. })
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Validation(violations) => {
                write!(f, "validation failed:")?;
                for v in violations {
                    write!(f, " [{}]", v)?;
                }
                Ok(())
            }
            StorageError::NotFound {
                source_id,
                version: Some(v),
            } => write!(f, "transcript not found: {} v{}", source_id, v),
            StorageError::NotFound {
                source_id,
                version: None,
            } => write!(f, "transcript not found: {}", source_id),
            StorageError::VersionConflict { source_id, version } => {
                write!(f, "version conflict: {} v{} already committed", source_id, version)
            }
            StorageError::ContentStore(e) => write!(f, "{}", e),
            StorageError::MetadataStore(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<ContentStoreError> for StorageError {
    fn from(e: ContentStoreError) -> Self {
        StorageError::ContentStore(e)
    }
}

impl From<MetadataStoreError> for StorageError {
    fn from(e: MetadataStoreError) -> Self {
        match e {
            MetadataStoreError::DuplicateVersion { source_id, version } => {
                StorageError::VersionConflict { source_id, version }
            }
            other => StorageError::MetadataStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_classification() {
        assert_eq!(
            StoreErrorKind::from_io_kind(ErrorKind::NotFound),
            StoreErrorKind::NotFound
        );
        assert_eq!(
            StoreErrorKind::from_io_kind(ErrorKind::PermissionDenied),
            StoreErrorKind::Unauthorized
        );
        assert_eq!(
            StoreErrorKind::from_io_kind(ErrorKind::TimedOut),
            StoreErrorKind::Unavailable
        );
        assert_eq!(
            StoreErrorKind::from_io_kind(ErrorKind::InvalidData),
            StoreErrorKind::Unknown
        );
    }

    #[test]
    fn test_validation_display_lists_every_violation() {
        let err = StorageError::Validation(vec![
            Violation::new("title", "is required"),
            Violation::new("date", "must be a canonical YYYY-MM-DD date"),
        ]);
        let text = err.to_string();
        assert!(text.contains("title"));
        assert!(text.contains("date"));
    }

    #[test]
    fn test_duplicate_maps_to_version_conflict() {
        let err: StorageError = MetadataStoreError::DuplicateVersion {
            source_id: "abc".to_string(),
            version: 3,
        }
        .into();
        assert!(err.is_conflict());
    }
}
