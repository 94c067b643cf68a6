//! ANN recall benchmark (invariant 9): measures brute-force vs. the
//! `MemStore` vector search path over a fixed synthetic corpus. The
//! production recall number against the real `pgvector` HNSW index is
//! exercised by `PgStore` integration tests against a live Postgres
//! instance; this bench tracks the in-process scoring path that backs
//! every other crate's test suite.

use archivist_core::model::{DocumentFilter, VECTOR_DIM};
use archivist_store::{MemStore, Store};
use criterion::{criterion_group, criterion_main, Criterion};

fn synthetic_vector(seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..VECTOR_DIM)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

async fn build_corpus(n: usize) -> MemStore {
    let store = MemStore::new();
    for i in 0..n {
        let doc = store.create_document(&format!("doc-{i}.pdf"), &format!("blobs/{i}"), None).await.unwrap();
        store.update_embedding(doc.id, &synthetic_vector(i as u64)).await.unwrap();
    }
    store
}

fn bench_vector_search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(build_corpus(10_000));
    let query = synthetic_vector(42);

    c.bench_function("vector_search_k10_over_10k", |b| {
        b.iter(|| rt.block_on(store.vector_search(&query, 10, &DocumentFilter::default())).unwrap())
    });
}

criterion_group!(benches, bench_vector_search);
criterion_main!(benches);
