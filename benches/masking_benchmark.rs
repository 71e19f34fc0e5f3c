//! Benchmarks for detection and masking throughput.
//!
//! Run with: cargo bench
//!
//! These benchmarks run regex-only detection over synthetic Korean
//! business text, so no model is needed.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unpii::{Document, MaskingEngine, Pipeline, PipelineOptions};

/// Creates a synthetic customer list with the given number of records.
fn create_records(count: usize) -> String {
    let mut text = String::from("고객 명단 (내부자료)\n");
    for i in 0..count {
        text.push_str(&format!(
            "{}. 연락처 010-{:04}-{:04}, 이메일 user{}@example.com, 주민번호 9001{:02}-1{:06}, 서울시 강남구 테헤란로 {}\n",
            i + 1,
            i % 10000,
            (i * 7) % 10000,
            i,
            (i % 28) + 1,
            i % 1_000_000,
            i + 1
        ));
    }
    text
}

/// Creates a csv with the given number of rows.
fn create_csv(rows: usize) -> String {
    let mut csv = String::from("name,phone,email\n");
    for i in 0..rows {
        csv.push_str(&format!("user{},010-1234-{:04},user{}@example.com\n", i, i % 10000, i));
    }
    csv
}

/// Benchmark detection at various sizes.
fn bench_analyze(c: &mut Criterion) {
    let engine = MaskingEngine::regex_only();
    let mut group = c.benchmark_group("analyze");

    for count in [10, 100, 1000].iter() {
        let text = create_records(*count);
        group.bench_function(format!("{}_records", count), |b| {
            b.iter(|| engine.analyze(black_box(&text)));
        });
    }

    group.finish();
}

/// Benchmark text masking.
fn bench_mask_text(c: &mut Criterion) {
    let engine = MaskingEngine::regex_only();
    let text = create_records(100);

    c.bench_function("mask_text_100_records", |b| {
        b.iter(|| engine.mask_text(black_box(&text)));
    });

    let masked = engine.mask_text(&text);
    c.bench_function("regex_pass_on_masked", |b| {
        b.iter(|| unpii::apply_regex_pass(black_box(&masked)));
    });
}

/// Benchmark a csv through the full pipeline.
fn bench_csv_document(c: &mut Criterion) {
    let pipeline = Pipeline::with_engine(MaskingEngine::regex_only(), PipelineOptions::new());
    let doc = Document::new("customers.csv", create_csv(500)).unwrap();

    c.bench_function("scan_csv_500_rows", |b| {
        b.iter(|| pipeline.scan_document(black_box(&doc)));
    });

    c.bench_function("mask_csv_500_rows", |b| {
        b.iter(|| pipeline.mask_document(black_box(&doc)).unwrap());
    });
}

criterion_group!(benches, bench_analyze, bench_mask_text, bench_csv_document);
criterion_main!(benches);
