//! Shape validation for upload metadata.
//!
//! Checks every field and reports every violation in one pass, so a caller
//! fixing a rejected request sees the full list instead of one problem per
//! round trip. Nothing here touches a store.

use crate::error::Violation;
use crate::types::{TranscriptFormat, UploadMetadata};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Canonical date shape for `date`, `dateFrom`, and `dateTo`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upload metadata that passed shape validation. Required fields are
/// guaranteed present; `source_id` stays optional because identity minting
/// happens at upload time, not here.
#[derive(Debug, Clone)]
pub struct ValidUpload {
    pub source_id: Option<String>,
    pub title: String,
    pub date: String,
    pub speakers: Vec<String>,
    pub format: TranscriptFormat,
    pub tags: Option<BTreeSet<String>>,
}

/// Parse a canonical `YYYY-MM-DD` date, rejecting any other shape.
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let parsed = NaiveDate::parse_from_str(s, DATE_FORMAT).ok()?;
    // "2024-1-5" parses but is not canonical; require the exact spelling so
    // stored dates stay lexicographically comparable.
    if parsed.format(DATE_FORMAT).to_string() == s {
        Some(parsed)
    } else {
        None
    }
}

/// Validate caller-supplied upload metadata.
///
/// On failure returns the complete violation list; the caller never sees a
/// partial report.
pub fn validate_upload(meta: &UploadMetadata) -> Result<ValidUpload, Vec<Violation>> {
    let mut violations = Vec::new();

    let source_id = match &meta.source_id {
        Some(s) if s.trim().is_empty() => {
            violations.push(Violation::new("sourceId", "must not be empty"));
            None
        }
        Some(s) => Some(s.clone()),
        None => None,
    };

    let title = match &meta.title {
        Some(t) if t.trim().is_empty() => {
            violations.push(Violation::new("title", "must not be empty"));
            None
        }
        Some(t) => Some(t.clone()),
        None => {
            violations.push(Violation::new("title", "is required"));
            None
        }
    };

    let date = match &meta.date {
        Some(d) if parse_date(d).is_some() => Some(d.clone()),
        Some(_) => {
            violations.push(Violation::new("date", "must be a canonical YYYY-MM-DD date"));
            None
        }
        None => {
            violations.push(Violation::new("date", "is required"));
            None
        }
    };

    let speakers = match &meta.speakers {
        Some(s) => Some(s.clone()),
        None => {
            violations.push(Violation::new("speakers", "is required"));
            None
        }
    };

    let format = match &meta.format {
        Some(raw) => match TranscriptFormat::parse(raw) {
            Some(f) => Some(f),
            None => {
                violations.push(Violation::new("format", "must be one of json, text, srt, vtt"));
                None
            }
        },
        None => {
            violations.push(Violation::new("format", "is required"));
            None
        }
    };

    match (title, date, speakers, format) {
        (Some(title), Some(date), Some(speakers), Some(format)) if violations.is_empty() => {
            Ok(ValidUpload {
                source_id,
                title,
                date,
                speakers,
                format,
                tags: meta.tags.clone(),
            })
        }
        _ => Err(violations),
    }
}
