//! Indexing and search benchmarks.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sidx::{SearchIndexer, parse_query};

const WORDS: &[&str] = &[
    "albedo", "normal", "roughness", "metallic", "occlusion", "height", "emissive", "terrain",
    "rock", "grass", "water", "cliff", "building", "vehicle", "character", "weapon",
];

fn build_index(doc_count: usize) -> SearchIndexer {
    let mut index = SearchIndexer::new("bench");
    index.start(true);
    for i in 0..doc_count {
        let word = WORDS[i % WORDS.len()];
        let id = format!("assets/{word}_{i:05}.png");
        let slot = index.add_document(&id, Some(word), None, true).unwrap();
        index.add_word(word, 2, 16, 10, slot);
        index.add_word(&format!("{word}{i}"), 2, 16, 20, slot);
        index.add_property("ext", "png", 1, 8, 0, slot, true, true);
        index.add_number("size", (i * 1024) as f64, 0, slot);
    }
    index.finish(&[]);
    index
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for doc_count in [100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(doc_count),
            &doc_count,
            |b, &doc_count| b.iter(|| black_box(build_index(doc_count))),
        );
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let index = build_index(10_000);
    let mut group = c.benchmark_group("search");
    for query in ["alb", "albedo ext:png", "size>500000", "rock | grass", "albedo -ext:mat"] {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, &query| {
            b.iter(|| black_box(index.search(query, i32::MAX, 50).unwrap()))
        });
    }
    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_query", |b| {
        b.iter(|| black_box(parse_query("albedo ext:png size>1024 -dir:temp | \"rock\"")))
    });
}

criterion_group!(benches, bench_build, bench_search, bench_parse);
criterion_main!(benches);
