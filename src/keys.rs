//! Content address generation.
//!
//! Every upload gets a fresh blob key, even for an identical
//! (source_id, version) pair: the random suffix means a retried upload can
//! never overwrite a blob another writer already committed. Keys are plain
//! `/`-separated paths so every content store backend can treat them as
//! object names.

use uuid::Uuid;

/// Builds blob keys and retrieval URLs under a fixed path prefix.
#[derive(Debug, Clone)]
pub struct BlobKeyGenerator {
    prefix: String,
    url_base: String,
}

impl BlobKeyGenerator {
    pub fn new(prefix: impl Into<String>, url_base: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        let url_base = url_base.into().trim_end_matches('/').to_string();
        BlobKeyGenerator { prefix, url_base }
    }

    /// Generate a fresh content address for (source_id, version).
    ///
    /// Shape: `{prefix}/{source_id}/v{version}/{random}.bin`. The source id
    /// segment is sanitized so caller-supplied ids cannot move the key out
    /// from under the prefix.
    pub fn generate(&self, source_id: &str, version: u32) -> String {
        let segment = sanitize_segment(source_id);
        let suffix = Uuid::new_v4().simple().to_string();
        if self.prefix.is_empty() {
            format!("{}/v{}/{}.bin", segment, version, suffix)
        } else {
            format!("{}/{}/v{}/{}.bin", self.prefix, segment, version, suffix)
        }
    }

    /// Retrieval address for a generated key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_base, key)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Keep keys readable but safe: anything outside `[A-Za-z0-9._-]` becomes
/// `-`, and a segment of only dots (path traversal) is replaced outright.
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "src".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_never_collide() {
        let keygen = BlobKeyGenerator::new("transcripts", "transcripts://local");
        let a = keygen.generate("mtg-001", 1);
        let b = keygen.generate("mtg-001", 1);
        assert_ne!(a, b);
        assert!(a.starts_with("transcripts/mtg-001/v1/"));
        assert!(b.starts_with("transcripts/mtg-001/v1/"));
        assert!(a.ends_with(".bin"));
    }

    #[test]
    fn test_prefix_and_url_base_are_normalized() {
        let keygen = BlobKeyGenerator::new("/transcripts/", "s3://bucket/");
        let key = keygen.generate("abc", 2);
        assert!(key.starts_with("transcripts/abc/v2/"));
        assert_eq!(
            keygen.url_for("transcripts/abc/v2/x.bin"),
            "s3://bucket/transcripts/abc/v2/x.bin"
        );
    }

    #[test]
    fn test_empty_prefix_drops_leading_segment() {
        let keygen = BlobKeyGenerator::new("", "transcripts://local");
        let key = keygen.generate("abc", 1);
        assert!(key.starts_with("abc/v1/"));
    }

    #[test]
    fn test_hostile_source_ids_stay_under_prefix() {
        let keygen = BlobKeyGenerator::new("transcripts", "transcripts://local");
        let key = keygen.generate("../../etc/passwd", 1);
        assert!(key.starts_with("transcripts/"));
        // Slashes were flattened: one sanitized segment, no traversal
        // components.
        assert!(key.split('/').all(|segment| segment != ".."));
        assert_eq!(key.split('/').count(), 4);

        let dots = keygen.generate("..", 1);
        assert!(dots.starts_with("transcripts/src/v1/"));
    }
}
