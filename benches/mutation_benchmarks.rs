//! Benchmarks for suggestion mutation and position mapping.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use inkling_buffer::{Assoc, BufferConfig, TextBuffer, Version};
use inkling_core::DocumentMutator;

/// Generates a large text string for benchmarking.
fn generate_large_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {}: This is a sample line of prose for benchmarking.\n", i))
        .collect()
}

/// A buffer that has seen `edits` single-character insertions, and the
/// version before the first.
fn edited_buffer(edits: usize) -> (TextBuffer, Version) {
    let mut buffer = TextBuffer::from_text(&generate_large_text(1000), BufferConfig::default());
    let base = buffer.version();
    for i in 0..edits {
        let pos = (i * 7919) % buffer.len_chars();
        let _ = buffer.insert(pos, "x");
    }
    (buffer, base)
}

/// Benchmarks composing and applying the step log.
fn bench_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping");

    for edits in [10, 100, 1000].iter() {
        let (buffer, base) = edited_buffer(*edits);

        group.bench_with_input(BenchmarkId::new("mapping_since", edits), &buffer, |b, buf| {
            b.iter(|| black_box(buf.mapping_since(black_box(base))))
        });

        let mapping = buffer.mapping_since(base);
        group.bench_with_input(BenchmarkId::new("map_span", edits), &mapping, |b, m| {
            b.iter(|| {
                m.as_ref()
                    .and_then(|m| m.map_span(black_box(5000), black_box(5040)))
            })
        });
        group.bench_with_input(BenchmarkId::new("map_position", edits), &mapping, |b, m| {
            b.iter(|| m.as_ref().map(|m| m.map(black_box(20000), Assoc::Before)))
        });
    }

    group.finish();
}

/// Benchmarks inserting a suggestion.
fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_suggestion");
    let mutator = DocumentMutator::default();
    let text = generate_large_text(10000);

    group.bench_function("at_end", |b| {
        b.iter_with_setup(
            || TextBuffer::from(text.as_str()),
            |mut buffer| {
                let end = buffer.len_chars();
                let range = mutator.insert(&mut buffer, black_box("and so it went."), end);
                black_box((buffer, range))
            },
        )
    });

    group.bench_function("at_middle", |b| {
        b.iter_with_setup(
            || TextBuffer::from(text.as_str()),
            |mut buffer| {
                let mid = buffer.len_chars() / 2;
                let range = mutator.insert(&mut buffer, black_box("and so it went."), mid);
                black_box((buffer, range))
            },
        )
    });

    group.finish();
}

/// Benchmarks removing a suggestion after edits further down.
fn bench_revert(c: &mut Criterion) {
    let mut group = c.benchmark_group("revert_suggestion");
    let mutator = DocumentMutator::default();
    let text = generate_large_text(10000);

    for edits in [0, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("after_edits", edits), edits, |b, &edits| {
            b.iter_with_setup(
                || {
                    let mut buffer = TextBuffer::from(text.as_str());
                    let mid = buffer.len_chars() / 2;
                    let range = mutator.insert(&mut buffer, "and so it went.", mid);
                    for _ in 0..edits {
                        let end = buffer.len_chars();
                        let _ = buffer.insert(end, "y");
                    }
                    (buffer, range)
                },
                |(mut buffer, range)| {
                    if let Ok(range) = range {
                        let _ = mutator.revert(&mut buffer, black_box(&range));
                    }
                    black_box(buffer)
                },
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_mapping, bench_insert, bench_revert);
criterion_main!(benches);
