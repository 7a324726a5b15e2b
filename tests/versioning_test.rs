//! Versioning Property Tests
//!
//! End-to-end checks over the public engine API for the version-history
//! guarantees: dense version sets under sequential uploads, descending
//! listings, round trips, and deletion leaving no trace. Runs against the
//! in-memory stores, with a SQLite-backed pass to confirm both metadata
//! backends agree.

use bytes::Bytes;
use std::sync::Arc;
use transcript_store::{
    BlobKeyGenerator, InMemoryContentStore, InMemoryMetadataStore, ProcessingStatus,
    SqliteMetadataStore, TranscriptStore, UploadMetadata,
};

fn engine() -> (TranscriptStore, InMemoryContentStore) {
    let content = InMemoryContentStore::new();
    let store = TranscriptStore::new(
        Arc::new(content.clone()),
        Arc::new(InMemoryMetadataStore::new()),
        BlobKeyGenerator::new("transcripts", "transcripts://local"),
    );
    (store, content)
}

async fn sqlite_engine() -> TranscriptStore {
    let metadata = SqliteMetadataStore::in_memory().await.unwrap();
    TranscriptStore::new(
        Arc::new(InMemoryContentStore::new()),
        Arc::new(metadata),
        BlobKeyGenerator::new("transcripts", "transcripts://local"),
    )
}

fn meta(source_id: &str, title: &str) -> UploadMetadata {
    UploadMetadata {
        source_id: Some(source_id.to_string()),
        title: Some(title.to_string()),
        date: Some("2024-05-17".to_string()),
        speakers: Some(vec!["alice".to_string(), "bob".to_string()]),
        format: Some("json".to_string()),
        tags: None,
    }
}

// =============================================================================
// Dense version history
// =============================================================================

#[tokio::test]
async fn test_sequential_uploads_yield_dense_versions() {
    let (store, _) = engine();

    let n = 7;
    for _ in 0..n {
        store
            .upload(Bytes::from_static(b"content"), meta("abc", "Weekly"))
            .await
            .unwrap();
    }

    let mut versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=n).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_list_versions_strictly_descending() {
    let (store, _) = engine();
    for _ in 0..5 {
        store
            .upload(Bytes::from_static(b"x"), meta("abc", "T"))
            .await
            .unwrap();
    }

    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert!(versions.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(versions, vec![5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn test_unknown_source_lists_empty() {
    let (store, _) = engine();
    assert!(store.list_versions("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hole_left_by_delete_is_not_refilled() {
    let (store, _) = engine();
    for _ in 0..3 {
        store
            .upload(Bytes::from_static(b"x"), meta("abc", "T"))
            .await
            .unwrap();
    }

    store.delete_version("abc", 2).await.unwrap();
    let receipt = store
        .upload(Bytes::from_static(b"x"), meta("abc", "T"))
        .await
        .unwrap();
    assert_eq!(receipt.metadata.version, 4);

    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![4, 3, 1]);
}

// =============================================================================
// Round trips
// =============================================================================

#[tokio::test]
async fn test_upload_get_round_trip() {
    let (store, _) = engine();

    let content = Bytes::from_static(b"00:00:01 alice: hello\n00:00:04 bob: hi");
    let receipt = store
        .upload(content.clone(), meta("abc", "Standup"))
        .await
        .unwrap();

    let doc = store
        .get("abc", Some(receipt.metadata.version))
        .await
        .unwrap();
    assert_eq!(doc.content, content);
    assert_eq!(doc.metadata, receipt.metadata);
}

#[tokio::test]
async fn test_get_without_version_returns_latest() {
    let (store, _) = engine();
    store
        .upload(Bytes::from_static(b"old"), meta("abc", "First"))
        .await
        .unwrap();
    store
        .upload(Bytes::from_static(b"new"), meta("abc", "Second"))
        .await
        .unwrap();

    let doc = store.get("abc", None).await.unwrap();
    assert_eq!(doc.metadata.version, 2);
    assert_eq!(&doc.content[..], b"new");
}

#[tokio::test]
async fn test_status_update_does_not_touch_content() {
    let (store, content) = engine();
    let receipt = store
        .upload(Bytes::from_static(b"payload"), meta("abc", "T"))
        .await
        .unwrap();

    let updated = store
        .update_status("abc", 1, ProcessingStatus::Processed)
        .await
        .unwrap();
    assert_eq!(updated.processing_status, ProcessingStatus::Processed);
    assert!(updated.processing_completed_at.is_some());
    assert_eq!(updated.blob_key, receipt.blob_key);

    let doc = store.get("abc", Some(1)).await.unwrap();
    assert_eq!(&doc.content[..], b"payload");
    assert_eq!(content.len(), 1);
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_all_leaves_no_trace() {
    let (store, content) = engine();
    for _ in 0..3 {
        store
            .upload(Bytes::from_static(b"x"), meta("abc", "T"))
            .await
            .unwrap();
    }

    store.delete_all("abc").await.unwrap();

    assert!(store.list_versions("abc").await.unwrap().is_empty());
    assert!(store.get("abc", None).await.unwrap_err().is_not_found());
    assert!(content.is_empty());
}

#[tokio::test]
async fn test_three_uploads_then_delete_middle_version() {
    let (store, _) = engine();
    for _ in 0..3 {
        store
            .upload(Bytes::from_static(b"x"), meta("abc", "T"))
            .await
            .unwrap();
    }

    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![3, 2, 1]);

    store.delete_version("abc", 2).await.unwrap();

    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![3, 1]);
}

// =============================================================================
// SQLite backend agreement
// =============================================================================

#[tokio::test]
async fn test_sqlite_backend_matches_in_memory_semantics() {
    let store = sqlite_engine().await;

    for _ in 0..3 {
        store
            .upload(Bytes::from_static(b"content"), meta("abc", "Weekly"))
            .await
            .unwrap();
    }
    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![3, 2, 1]);

    store.delete_version("abc", 2).await.unwrap();
    let versions: Vec<u32> = store
        .list_versions("abc")
        .await
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![3, 1]);

    store.delete_all("abc").await.unwrap();
    assert!(store.get("abc", None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_sqlite_round_trip_preserves_metadata() {
    let store = sqlite_engine().await;

    let mut upload = meta("abc", "Quarterly Review");
    upload.tags = Some(std::collections::BTreeSet::from([
        "finance".to_string(),
        "q3".to_string(),
    ]));
    let receipt = store
        .upload(Bytes::from_static(b"transcript body"), upload)
        .await
        .unwrap();

    let doc = store.get("abc", Some(1)).await.unwrap();
    assert_eq!(doc.metadata, receipt.metadata);
    assert_eq!(&doc.content[..], b"transcript body");
}
