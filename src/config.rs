//! Engine Configuration
//!
//! Describes which store backends to use and turns that description into a
//! wired [`TranscriptStore`] via [`connect`]. Handles are always passed
//! explicitly; there is no process-wide storage singleton.
//!
//! Environment variables (read by `StoreConfig::from_env`):
//!
//! | Variable                   | Default              | Meaning                       |
//! |----------------------------|----------------------|-------------------------------|
//! | TRANSCRIPT_CONTENT_STORE   | memory               | memory, localfs, or s3        |
//! | TRANSCRIPT_METADATA_STORE  | memory               | memory or sqlite              |
//! | TRANSCRIPT_KEY_PREFIX      | transcripts          | blob key prefix               |
//! | TRANSCRIPT_URL_BASE        | transcripts://local  | base of recorded URLs         |
//! | TRANSCRIPT_DATA_PATH       | (unset)              | localfs blob root             |
//! | TRANSCRIPT_SQLITE_PATH     | (unset = in-memory)  | sqlite database file          |
//! | TRANSCRIPT_S3_BUCKET       | (unset)              | bucket name (s3 feature)      |
//! | TRANSCRIPT_S3_REGION       | us-east-1            | region (s3 feature)           |
//! | TRANSCRIPT_S3_ENDPOINT     | (unset)              | custom endpoint (s3 feature)  |

use crate::content_store::{ContentStore, InMemoryContentStore, LocalFsContentStore};
use crate::coordinator::TranscriptStore;
use crate::error::{ContentStoreError, MetadataStoreError};
use crate::keys::BlobKeyGenerator;
use crate::metadata_store::{InMemoryMetadataStore, MetadataStore};
#[cfg(feature = "s3")]
use crate::s3_store::S3ContentStore;
use crate::sqlite_store::SqliteMetadataStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Main configuration for the storage engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Content store backend.
    pub content: ContentBackend,
    /// Metadata store backend.
    pub metadata: MetadataBackend,
    /// Key prefix for every blob written by this engine.
    pub prefix: String,
    /// Base of the retrieval URLs recorded in metadata.
    pub url_base: String,
    /// Local filesystem blob root (for the LocalFs backend).
    pub local_path: Option<PathBuf>,
    /// SQLite database file; unset means a private in-memory database.
    pub sqlite_path: Option<PathBuf>,
    /// S3 configuration (for the S3 backend).
    #[cfg(feature = "s3")]
    pub s3: Option<S3Config>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            content: ContentBackend::InMemory,
            metadata: MetadataBackend::InMemory,
            prefix: "transcripts".to_string(),
            url_base: "transcripts://local".to_string(),
            local_path: None,
            sqlite_path: None,
            #[cfg(feature = "s3")]
            s3: None,
        }
    }
}

impl StoreConfig {
    /// Config for local development: blobs and index under one directory.
    pub fn local(path: PathBuf) -> Self {
        StoreConfig {
            content: ContentBackend::LocalFs,
            metadata: MetadataBackend::Sqlite,
            prefix: "transcripts".to_string(),
            url_base: "transcripts://local".to_string(),
            local_path: Some(path.join("blobs")),
            sqlite_path: Some(path.join("index.db")),
            #[cfg(feature = "s3")]
            s3: None,
        }
    }

    /// Config for testing (everything in memory).
    pub fn test() -> Self {
        StoreConfig {
            content: ContentBackend::InMemory,
            metadata: MetadataBackend::InMemory,
            prefix: "test".to_string(),
            url_base: "transcripts://test".to_string(),
            local_path: None,
            sqlite_path: None,
            #[cfg(feature = "s3")]
            s3: None,
        }
    }

    /// Build a config from `TRANSCRIPT_*` environment variables. Unknown
    /// backend names fall back to the default with a warning.
    pub fn from_env() -> Self {
        let mut config = StoreConfig::default();

        if let Ok(raw) = std::env::var("TRANSCRIPT_CONTENT_STORE") {
            match raw.as_str() {
                "memory" => config.content = ContentBackend::InMemory,
                "localfs" => config.content = ContentBackend::LocalFs,
                #[cfg(feature = "s3")]
                "s3" => config.content = ContentBackend::S3,
                other => warn!("unknown TRANSCRIPT_CONTENT_STORE {:?}, using memory", other),
            }
        }
        if let Ok(raw) = std::env::var("TRANSCRIPT_METADATA_STORE") {
            match raw.as_str() {
                "memory" => config.metadata = MetadataBackend::InMemory,
                "sqlite" => config.metadata = MetadataBackend::Sqlite,
                other => warn!("unknown TRANSCRIPT_METADATA_STORE {:?}, using memory", other),
            }
        }
        if let Ok(prefix) = std::env::var("TRANSCRIPT_KEY_PREFIX") {
            config.prefix = prefix;
        }
        if let Ok(url_base) = std::env::var("TRANSCRIPT_URL_BASE") {
            config.url_base = url_base;
        }
        if let Ok(path) = std::env::var("TRANSCRIPT_DATA_PATH") {
            config.local_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("TRANSCRIPT_SQLITE_PATH") {
            config.sqlite_path = Some(PathBuf::from(path));
        }
        #[cfg(feature = "s3")]
        if let Ok(bucket) = std::env::var("TRANSCRIPT_S3_BUCKET") {
            config.s3 = Some(S3Config {
                bucket,
                region: std::env::var("TRANSCRIPT_S3_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("TRANSCRIPT_S3_ENDPOINT").ok(),
            });
        }

        config
    }

    /// Parse a TOML document. Absent keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(ConfigError::Parse)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

/// Type of content store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentBackend {
    /// In-memory store (for tests)
    InMemory,
    /// Local filesystem
    LocalFs,
    /// Amazon S3 or compatible
    #[cfg(feature = "s3")]
    S3,
}

/// Type of metadata store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataBackend {
    /// In-memory store (for tests)
    InMemory,
    /// SQLite index (file-backed or in-memory)
    Sqlite,
}

/// S3 configuration.
#[cfg(feature = "s3")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint (for S3-compatible services like MinIO)
    pub endpoint: Option<String>,
}

/// Error constructing an engine from configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Could not read the config file.
    Io(std::io::Error),
    /// TOML syntax or type error.
    Parse(toml::de::Error),
    /// The config references a backend but omits a value it needs.
    Invalid(String),
    /// The content store could not be constructed.
    Content(ContentStoreError),
    /// The metadata store could not be constructed.
    Metadata(MetadataStoreError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::Content(e) => write!(f, "content store setup failed: {}", e),
            ConfigError::Metadata(e) => write!(f, "metadata store setup failed: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Construct both stores and a coordinator from a config.
pub async fn connect(config: &StoreConfig) -> Result<TranscriptStore, ConfigError> {
    let content: Arc<dyn ContentStore> = match config.content {
        ContentBackend::InMemory => Arc::new(InMemoryContentStore::new()),
        ContentBackend::LocalFs => {
            let path = config.local_path.clone().ok_or_else(|| {
                ConfigError::Invalid("localfs content backend requires local_path".to_string())
            })?;
            Arc::new(LocalFsContentStore::new(path))
        }
        #[cfg(feature = "s3")]
        ContentBackend::S3 => {
            let s3 = config.s3.clone().ok_or_else(|| {
                ConfigError::Invalid("s3 content backend requires the [s3] section".to_string())
            })?;
            Arc::new(S3ContentStore::new(&s3).await.map_err(ConfigError::Content)?)
        }
    };

    let metadata: Arc<dyn MetadataStore> = match config.metadata {
        MetadataBackend::InMemory => Arc::new(InMemoryMetadataStore::new()),
        MetadataBackend::Sqlite => match &config.sqlite_path {
            Some(path) => Arc::new(
                SqliteMetadataStore::open(path)
                    .await
                    .map_err(ConfigError::Metadata)?,
            ),
            None => Arc::new(
                SqliteMetadataStore::in_memory()
                    .await
                    .map_err(ConfigError::Metadata)?,
            ),
        },
    };

    let keygen = BlobKeyGenerator::new(config.prefix.clone(), config.url_base.clone());
    Ok(TranscriptStore::new(content, metadata, keygen))
}
