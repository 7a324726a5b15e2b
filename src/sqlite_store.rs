//! SQLite Metadata Store
//!
//! Durable metadata index backed by SQLite via `sqlx`. The composite
//! primary key on (source_id, version) is the uniqueness constraint that
//! serializes concurrent uploads; a constraint trip surfaces as
//! `DuplicateVersion`.
//!
//! Storage notes:
//! - `speakers` and `tags` are JSON text columns, queried with `json_each`
//! - timestamps are Unix-millisecond integers
//! - the search projection joins each source against its MAX(version)

use crate::error::{MetadataStoreError, StoreErrorKind};
use crate::metadata_store::MetadataStore;
use crate::query::{Page, SearchFilter};
use crate::types::{ProcessingStatus, TranscriptFormat, TranscriptMetadata};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transcripts (
    source_id                  TEXT    NOT NULL,
    version                    INTEGER NOT NULL,
    title                      TEXT    NOT NULL,
    date                       TEXT    NOT NULL,
    speakers                   TEXT    NOT NULL,
    format                     TEXT    NOT NULL,
    tags                       TEXT,
    processing_status          TEXT    NOT NULL,
    uploaded_at_ms             INTEGER NOT NULL,
    processing_completed_at_ms INTEGER,
    blob_key                   TEXT    NOT NULL,
    url                        TEXT    NOT NULL,
    size_bytes                 INTEGER NOT NULL,
    PRIMARY KEY (source_id, version)
);
CREATE INDEX IF NOT EXISTS idx_transcripts_uploaded_at ON transcripts(uploaded_at_ms);
CREATE INDEX IF NOT EXISTS idx_transcripts_date ON transcripts(date);
CREATE INDEX IF NOT EXISTS idx_transcripts_status ON transcripts(processing_status);
"#;

/// Column list for plain selects.
const COLUMNS: &str = "source_id, version, title, date, speakers, format, tags, \
     processing_status, uploaded_at_ms, processing_completed_at_ms, blob_key, url, size_bytes";

/// Column list for the latest-projection join, where bare `source_id` and
/// `version` would be ambiguous.
const T_COLUMNS: &str = "t.source_id, t.version, t.title, t.date, t.speakers, t.format, t.tags, \
     t.processing_status, t.uploaded_at_ms, t.processing_completed_at_ms, t.blob_key, t.url, t.size_bytes";

/// SQLite-backed metadata store.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MetadataStoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    MetadataStoreError::backend(
                        StoreErrorKind::from_io_kind(e.kind()),
                        format!("failed to create {}: {}", parent.display(), e),
                    )
                })?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let store = Self::with_options(options, 5).await?;
        info!("opened metadata index at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database (tests, ephemeral engines).
    pub async fn in_memory() -> Result<Self, MetadataStoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(map_sqlx_error)?
            .busy_timeout(Duration::from_secs(5));
        // One connection only: each pooled connection would otherwise get
        // its own empty database.
        Self::with_options(options, 1).await
    }

    async fn with_options(
        options: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, MetadataStoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(SqliteMetadataStore { pool })
    }

    /// Underlying pool (for testing).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_record(
        &self,
        source_id: &str,
        version: u32,
    ) -> Result<Option<TranscriptMetadata>, MetadataStoreError> {
        let sql = format!(
            "SELECT {} FROM transcripts WHERE source_id = ?1 AND version = ?2",
            COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(source_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.as_ref().map(row_to_record).transpose()
    }
}

/// Classify a sqlx failure into the adapter taxonomy.
fn map_sqlx_error(e: sqlx::Error) -> MetadataStoreError {
    let kind = match &e {
        sqlx::Error::RowNotFound => StoreErrorKind::NotFound,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreErrorKind::Unavailable
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // SQLITE_FULL / SQLITE_AUTH
            Some("13") => StoreErrorKind::QuotaExceeded,
            Some("23") => StoreErrorKind::Unauthorized,
            _ => StoreErrorKind::Unknown,
        },
        _ => StoreErrorKind::Unknown,
    };
    MetadataStoreError::backend(kind, e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// A stored value the decoder cannot represent is index corruption, not a
/// caller mistake; surface it as an unknown backend error.
fn corrupt(what: &str, detail: impl std::fmt::Display) -> MetadataStoreError {
    MetadataStoreError::backend(
        StoreErrorKind::Unknown,
        format!("corrupt index value for {}: {}", what, detail),
    )
}

fn row_to_record(row: &SqliteRow) -> Result<TranscriptMetadata, MetadataStoreError> {
    let version_raw: i64 = row.try_get("version").map_err(map_sqlx_error)?;
    let version = u32::try_from(version_raw).map_err(|_| corrupt("version", version_raw))?;

    let speakers_json: String = row.try_get("speakers").map_err(map_sqlx_error)?;
    let speakers: Vec<String> =
        serde_json::from_str(&speakers_json).map_err(|e| corrupt("speakers", e))?;

    let tags_json: Option<String> = row.try_get("tags").map_err(map_sqlx_error)?;
    let tags = tags_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| corrupt("tags", e))?;

    let format_raw: String = row.try_get("format").map_err(map_sqlx_error)?;
    let format = TranscriptFormat::parse(&format_raw).ok_or_else(|| corrupt("format", &format_raw))?;

    let status_raw: String = row.try_get("processing_status").map_err(map_sqlx_error)?;
    let processing_status =
        ProcessingStatus::parse(&status_raw).ok_or_else(|| corrupt("processing_status", &status_raw))?;

    let uploaded_ms: i64 = row.try_get("uploaded_at_ms").map_err(map_sqlx_error)?;
    let uploaded_at = DateTime::from_timestamp_millis(uploaded_ms)
        .ok_or_else(|| corrupt("uploaded_at_ms", uploaded_ms))?;

    let completed_ms: Option<i64> = row
        .try_get("processing_completed_at_ms")
        .map_err(map_sqlx_error)?;
    let processing_completed_at = completed_ms
        .map(|ms| DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt("processing_completed_at_ms", ms)))
        .transpose()?;

    let size_raw: i64 = row.try_get("size_bytes").map_err(map_sqlx_error)?;
    let size = u64::try_from(size_raw).map_err(|_| corrupt("size_bytes", size_raw))?;

    Ok(TranscriptMetadata {
        source_id: row.try_get("source_id").map_err(map_sqlx_error)?,
        version,
        title: row.try_get("title").map_err(map_sqlx_error)?,
        date: row.try_get("date").map_err(map_sqlx_error)?,
        speakers,
        format,
        tags,
        processing_status,
        uploaded_at,
        processing_completed_at,
        blob_key: row.try_get("blob_key").map_err(map_sqlx_error)?,
        url: row.try_get("url").map_err(map_sqlx_error)?,
        size,
    })
}

/// Escape `%`, `_`, and the escape character itself for a LIKE pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Append the WHERE clauses for a filter. Mirrors `matches_filter` in
/// `metadata_store` clause for clause; records are aliased `t`.
fn push_filter_clauses(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SearchFilter) {
    if let Some(title) = &filter.title {
        let pattern = format!("%{}%", escape_like(&title.to_ascii_lowercase()));
        qb.push(" AND lower(t.title) LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\'");
    }
    if let Some(speaker) = &filter.speaker {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(t.speakers) WHERE json_each.value = ");
        qb.push_bind(speaker.clone());
        qb.push(")");
    }
    if let Some(tag) = &filter.tag {
        qb.push(" AND t.tags IS NOT NULL AND EXISTS (SELECT 1 FROM json_each(t.tags) WHERE json_each.value = ");
        qb.push_bind(tag.clone());
        qb.push(")");
    }
    if let Some(from) = &filter.date_from {
        qb.push(" AND t.date >= ");
        qb.push_bind(from.clone());
    }
    if let Some(to) = &filter.date_to {
        qb.push(" AND t.date <= ");
        qb.push_bind(to.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND t.processing_status = ");
        qb.push_bind(status.as_str());
    }
}

/// FROM clause selecting only the highest version per source.
const LATEST_JOIN: &str = " FROM transcripts t \
     JOIN (SELECT source_id, MAX(version) AS version FROM transcripts GROUP BY source_id) latest \
     ON t.source_id = latest.source_id AND t.version = latest.version WHERE 1=1";

impl MetadataStore for SqliteMetadataStore {
    fn insert<'a>(
        &'a self,
        record: &'a TranscriptMetadata,
    ) -> Pin<Box<dyn Future<Output = Result<(), MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let speakers = serde_json::to_string(&record.speakers)
                .map_err(|e| corrupt("speakers", e))?;
            let tags = record
                .tags
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| corrupt("tags", e))?;

            let result = sqlx::query(
                "INSERT INTO transcripts (source_id, version, title, date, speakers, format, \
                 tags, processing_status, uploaded_at_ms, processing_completed_at_ms, blob_key, \
                 url, size_bytes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )
            .bind(&record.source_id)
            .bind(record.version)
            .bind(&record.title)
            .bind(&record.date)
            .bind(&speakers)
            .bind(record.format.as_str())
            .bind(tags.as_deref())
            .bind(record.processing_status.as_str())
            .bind(record.uploaded_at.timestamp_millis())
            .bind(record.processing_completed_at.map(|t| t.timestamp_millis()))
            .bind(&record.blob_key)
            .bind(&record.url)
            .bind(record.size as i64)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(MetadataStoreError::DuplicateVersion {
                    source_id: record.source_id.clone(),
                    version: record.version,
                }),
                Err(e) => Err(map_sqlx_error(e)),
            }
        })
    }

    fn max_version<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT COALESCE(MAX(version), 0) AS max_version FROM transcripts WHERE source_id = ?1",
            )
            .bind(source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
            let max: i64 = row.try_get("max_version").map_err(map_sqlx_error)?;
            u32::try_from(max).map_err(|_| corrupt("version", max))
        })
    }

    fn get<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(self.fetch_record(source_id, version))
    }

    fn latest<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let sql = format!(
                "SELECT {} FROM transcripts WHERE source_id = ?1 ORDER BY version DESC LIMIT 1",
                COLUMNS
            );
            let row = sqlx::query(&sql)
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            row.as_ref().map(row_to_record).transpose()
        })
    }

    fn list_versions<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<TranscriptMetadata>, MetadataStoreError>> + Send + 'a>>
    {
        Box::pin(async move {
            let sql = format!(
                "SELECT {} FROM transcripts WHERE source_id = ?1 ORDER BY version DESC",
                COLUMNS
            );
            let rows = sqlx::query(&sql)
                .bind(source_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            rows.iter().map(row_to_record).collect()
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
            let result = sqlx::query(
                "UPDATE transcripts SET processing_status = ?1, processing_completed_at_ms = ?2 \
                 WHERE source_id = ?3 AND version = ?4",
            )
            .bind(status.as_str())
            .bind(completed_at.map(|t| t.timestamp_millis()))
            .bind(source_id)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Ok(None);
            }
            self.fetch_record(source_id, version).await
        })
    }

    fn delete<'a>(
        &'a self,
        source_id: &'a str,
        version: u32,
    ) -> Pin<Box<dyn Future<Output = Result<bool, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM transcripts WHERE source_id = ?1 AND version = ?2")
                .bind(source_id)
                .bind(version)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_all<'a>(
        &'a self,
        source_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u64, MetadataStoreError>> + Send + 'a>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM transcripts WHERE source_id = ?1")
                .bind(source_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            Ok(result.rows_affected())
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
            // Total first, unconstrained by the page window.
            let mut count_qb =
                QueryBuilder::new(format!("SELECT COUNT(*) AS total{}", LATEST_JOIN));
            push_filter_clauses(&mut count_qb, filter);
            let total_row = count_qb
                .build()
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let total: i64 = total_row.try_get("total").map_err(map_sqlx_error)?;

            let mut qb = QueryBuilder::new(format!("SELECT {}{}", T_COLUMNS, LATEST_JOIN));
            push_filter_clauses(&mut qb, filter);
            qb.push(" ORDER BY t.uploaded_at_ms DESC, t.source_id ASC LIMIT ");
            qb.push_bind(page.limit());
            qb.push(" OFFSET ");
            qb.push_bind(page.offset());
            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
            let items: Result<Vec<TranscriptMetadata>, MetadataStoreError> =
                rows.iter().map(row_to_record).collect();
            Ok((items?, total as u64))
        })
    }
}
