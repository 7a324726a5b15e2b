//! Query inputs: pagination windows and search predicates.
//!
//! Predicates combine with AND; a record must satisfy every supplied one.
//! An empty predicate set behaves exactly like a plain listing. All
//! validation happens here, before any store is asked to execute anything,
//! and every violation is reported together.

use crate::error::Violation;
use crate::types::ProcessingStatus;
use crate::validate::parse_date;
use serde::{Deserialize, Serialize};

/// Page size used when the caller omits `limit`.
pub const DEFAULT_LIMIT: u32 = 50;

/// Validated pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    limit: u32,
    offset: u32,
}

impl Page {
    /// Build a window from optional caller values.
    ///
    /// `limit` must be positive when supplied; any offset is allowed (a
    /// window past the end is simply empty).
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Result<Self, Vec<Violation>> {
        let mut violations = Vec::new();
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 {
            violations.push(Violation::new("limit", "must be greater than zero"));
        }
        if violations.is_empty() {
            Ok(Page {
                limit,
                offset: offset.unwrap_or(0),
            })
        } else {
            Err(violations)
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Raw search request: every predicate optional, nothing validated yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Case-insensitive substring match on the title.
    #[serde(default)]
    pub title: Option<String>,
    /// Exact membership in the speaker list.
    #[serde(default)]
    pub speaker: Option<String>,
    /// Exact membership in the tag set.
    #[serde(default)]
    pub tag: Option<String>,
    /// Inclusive lower bound on the recording date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_from: Option<String>,
    /// Inclusive upper bound on the recording date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_to: Option<String>,
    /// Exact processing status: `pending`, `processed`, or `failed`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// Validated predicate set. Construction implies every shape was accepted;
/// stores may trust the contents.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub title: Option<String>,
    pub speaker: Option<String>,
    pub tag: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub status: Option<ProcessingStatus>,
}

impl SearchFilter {
    /// True when no predicate is set (plain listing semantics).
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.speaker.is_none()
            && self.tag.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.status.is_none()
    }
}

impl SearchQuery {
    /// Validate predicates and pagination together.
    ///
    /// Either everything is well-formed and a (filter, page) pair comes
    /// back, or the complete violation list does — never a partial filter.
    pub fn into_filter(self) -> Result<(SearchFilter, Page), Vec<Violation>> {
        let mut violations = Vec::new();

        let date_from = match &self.date_from {
            Some(d) if parse_date(d).is_some() => Some(d.clone()),
            Some(_) => {
                violations.push(Violation::new("dateFrom", "must be a canonical YYYY-MM-DD date"));
                None
            }
            None => None,
        };

        let date_to = match &self.date_to {
            Some(d) if parse_date(d).is_some() => Some(d.clone()),
            Some(_) => {
                violations.push(Violation::new("dateTo", "must be a canonical YYYY-MM-DD date"));
                None
            }
            None => None,
        };

        // Canonical dates compare lexicographically.
        if let (Some(from), Some(to)) = (&date_from, &date_to) {
            if from > to {
                violations.push(Violation::new("dateFrom", "must not be after dateTo"));
            }
        }

        let status = match &self.status {
            Some(raw) => match ProcessingStatus::parse(raw) {
                Some(s) => Some(s),
                None => {
                    violations.push(Violation::new(
                        "status",
                        "must be one of pending, processed, failed",
                    ));
                    None
                }
            },
            None => None,
        };

        let page = match Page::new(self.limit, self.offset) {
            Ok(p) => Some(p),
            Err(mut v) => {
                violations.append(&mut v);
                None
            }
        };

        let filter = SearchFilter {
            title: self.title,
            speaker: self.speaker,
            tag: self.tag,
            date_from,
            date_to,
            status,
        };

        match page {
            Some(page) if violations.is_empty() => Ok((filter, page)),
            _ => Err(violations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page = Page::new(None, None).unwrap();
        assert_eq!(page.limit(), DEFAULT_LIMIT);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let violations = Page::new(Some(0), None).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "limit");
    }

    #[test]
    fn test_large_offset_allowed() {
        let page = Page::new(Some(10), Some(1_000_000)).unwrap();
        assert_eq!(page.offset(), 1_000_000);
    }

    #[test]
    fn test_empty_query_yields_empty_filter() {
        let (filter, page) = SearchQuery::default().into_filter().unwrap();
        assert!(filter.is_empty());
        assert_eq!(page, Page::default());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let query = SearchQuery {
            date_from: Some("2024-06-01".to_string()),
            date_to: Some("2024-01-01".to_string()),
            ..SearchQuery::default()
        };
        let violations = query.into_filter().unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "dateFrom");
    }

    #[test]
    fn test_equal_bounds_are_a_valid_range() {
        let query = SearchQuery {
            date_from: Some("2024-06-01".to_string()),
            date_to: Some("2024-06-01".to_string()),
            ..SearchQuery::default()
        };
        assert!(query.into_filter().is_ok());
    }

    #[test]
    fn test_all_violations_reported_together() {
        let query = SearchQuery {
            date_from: Some("June 1".to_string()),
            date_to: Some("2024-6-1".to_string()),
            status: Some("archived".to_string()),
            limit: Some(0),
            ..SearchQuery::default()
        };
        let violations = query.into_filter().unwrap_err();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"dateFrom"));
        assert!(fields.contains(&"dateTo"));
        assert!(fields.contains(&"status"));
        assert!(fields.contains(&"limit"));
        assert_eq!(violations.len(), 4);
    }

    #[test]
    fn test_valid_query_carries_every_predicate() {
        let query = SearchQuery {
            title: Some("standup".to_string()),
            speaker: Some("alice".to_string()),
            tag: Some("weekly".to_string()),
            date_from: Some("2024-01-01".to_string()),
            date_to: Some("2024-12-31".to_string()),
            status: Some("processed".to_string()),
            limit: Some(5),
            offset: Some(10),
        };
        let (filter, page) = query.into_filter().unwrap();
        assert!(!filter.is_empty());
        assert_eq!(filter.status, Some(ProcessingStatus::Processed));
        assert_eq!(filter.date_from.as_deref(), Some("2024-01-01"));
        assert_eq!(page.limit(), 5);
        assert_eq!(page.offset(), 10);
    }
}
