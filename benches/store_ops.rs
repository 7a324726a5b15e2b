//! Storage engine benchmarks.
//!
//! Run with: `cargo bench --bench store_ops`
//!
//! Measures the upload saga and the search projection against the in-memory
//! stores, so the numbers reflect engine overhead (validation, key
//! generation, version allocation, projection/filtering) rather than
//! backend I/O.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use transcript_store::{
    BlobKeyGenerator, InMemoryContentStore, InMemoryMetadataStore, SearchQuery, TranscriptStore,
    UploadMetadata,
};
use tokio::runtime::Runtime;

fn engine() -> TranscriptStore {
    TranscriptStore::new(
        Arc::new(InMemoryContentStore::new()),
        Arc::new(InMemoryMetadataStore::new()),
        BlobKeyGenerator::new("transcripts", "transcripts://local"),
    )
}

fn meta(source_id: &str) -> UploadMetadata {
    UploadMetadata {
        source_id: Some(source_id.to_string()),
        title: Some("Weekly engineering sync".to_string()),
        date: Some("2024-05-17".to_string()),
        speakers: Some(vec!["alice".to_string(), "bob".to_string()]),
        format: Some("text".to_string()),
        tags: None,
    }
}

/// Benchmark the full upload saga for various content sizes.
fn bench_upload(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("upload");
    group.throughput(Throughput::Elements(1));

    for content_len in [256, 4 * 1024, 64 * 1024] {
        let content = Bytes::from(vec![b'x'; content_len]);
        let store = engine();

        group.bench_function(format!("content_len_{}", content_len), |b| {
            b.iter(|| {
                rt.block_on(async {
                    store
                        .upload(black_box(content.clone()), black_box(meta("bench")))
                        .await
                        .unwrap()
                })
            })
        });
    }

    group.finish();
}

/// Benchmark listing and filtered search over a populated projection.
fn bench_search(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Elements(1));

    for sources in [100, 1_000] {
        let store = engine();
        rt.block_on(async {
            for i in 0..sources {
                // Three versions each, so the projection has work to do.
                for _ in 0..3 {
                    store
                        .upload(Bytes::from_static(b"body"), meta(&format!("src-{}", i)))
                        .await
                        .unwrap();
                }
            }
        });

        group.bench_function(format!("list_{}_sources", sources), |b| {
            b.iter(|| {
                rt.block_on(async {
                    store
                        .list(black_box(Some(50)), black_box(None))
                        .await
                        .unwrap()
                })
            })
        });

        group.bench_function(format!("title_search_{}_sources", sources), |b| {
            b.iter(|| {
                rt.block_on(async {
                    store
                        .search(black_box(SearchQuery {
                            title: Some("engineering".to_string()),
                            speaker: Some("alice".to_string()),
                            ..SearchQuery::default()
                        }))
                        .await
                        .unwrap()
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_upload, bench_search);
criterion_main!(benches);
