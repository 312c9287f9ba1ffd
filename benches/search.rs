use corpus_rag::index::VectorIndex;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const DIMENSION: usize = 768;

/// Deterministic pseudo-random vectors so runs are comparable
fn vectors(count: usize, seed: u32) -> Vec<Vec<f32>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| {
                    state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (state >> 8) as f32 / (1u32 << 24) as f32
                })
                .collect()
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let queries = vectors(8, 7);

    for rows in [1_000, 10_000] {
        let mut index = VectorIndex::new();
        for vector in vectors(rows, 42) {
            index.add(&vector).expect("vectors share one dimension");
        }

        group.bench_with_input(BenchmarkId::new("top3", rows), &index, |b, index| {
            b.iter(|| index.search(black_box(&queries[0]), black_box(3)))
        });
        group.bench_with_input(BenchmarkId::new("batch8_top3", rows), &index, |b, index| {
            b.iter(|| index.search_batch(black_box(&queries), black_box(3)))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
