//! Core data types for versioned transcripts.
//!
//! A transcript is identified by `source_id` and carries a dense version
//! history starting at 1. Each stored version pairs a content blob (opaque
//! bytes in the content store) with one metadata record (in the metadata
//! index). [`TranscriptMetadata`] is the committed record; [`UploadMetadata`]
//! is the caller-supplied shape before validation.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Content format of an uploaded transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    Json,
    Text,
    Srt,
    Vtt,
}

impl TranscriptFormat {
    pub const ALL: [TranscriptFormat; 4] = [
        TranscriptFormat::Json,
        TranscriptFormat::Text,
        TranscriptFormat::Srt,
        TranscriptFormat::Vtt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptFormat::Json => "json",
            TranscriptFormat::Text => "text",
            TranscriptFormat::Srt => "srt",
            TranscriptFormat::Vtt => "vtt",
        }
    }

    /// Parse the lowercase wire name. Anything else is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(TranscriptFormat::Json),
            "text" => Some(TranscriptFormat::Text),
            "srt" => Some(TranscriptFormat::Srt),
            "vtt" => Some(TranscriptFormat::Vtt),
            _ => None,
        }
    }
}

impl std::fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing lifecycle state of one stored version.
///
/// Any state may move to any state; regressions (`processed` back to
/// `pending`) clear the completion stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "processed" => Some(ProcessingStatus::Processed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One committed metadata record, keyed by (source_id, version).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMetadata {
    /// Logical transcript identity; versions of one transcript share it.
    pub source_id: String,
    /// 1-based position in the source's history.
    pub version: u32,
    pub title: String,
    /// Recording date, canonical `YYYY-MM-DD`.
    pub date: String,
    /// Ordered speaker list; may be empty.
    pub speakers: Vec<String>,
    pub format: TranscriptFormat,
    /// Optional tag set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    pub processing_status: ProcessingStatus,
    /// Stamped at commit; immutable afterwards. Whole-millisecond precision.
    pub uploaded_at: DateTime<Utc>,
    /// Stamped when the record moves to `processed`, cleared otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<DateTime<Utc>>,
    /// Content address in the content store.
    pub blob_key: String,
    /// Retrieval address recorded for the content.
    pub url: String,
    /// Content length in bytes.
    pub size: u64,
}

/// Caller-supplied metadata for an upload, before shape validation.
///
/// Required fields are still `Option` here so validation can report every
/// missing field in one pass instead of failing to construct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    /// Omitted means "mint a fresh identity for this upload".
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Canonical `YYYY-MM-DD`; shape-checked, otherwise opaque.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub speakers: Option<Vec<String>>,
    /// One of `json`, `text`, `srt`, `vtt`.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
}

/// Result of a committed upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Retrieval address for the stored content.
    pub url: String,
    /// Content address the blob was written under.
    pub blob_key: String,
    /// The committed metadata record, version included.
    pub metadata: TranscriptMetadata,
}

/// A retrieved transcript: raw content plus its metadata record.
#[derive(Debug, Clone)]
pub struct TranscriptDocument {
    pub content: Bytes,
    pub metadata: TranscriptMetadata,
}

/// One page of metadata records plus the total match count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPage {
    pub items: Vec<TranscriptMetadata>,
    /// Total matches across the whole result set, independent of the page
    /// window.
    pub total: u64,
}
