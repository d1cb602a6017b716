//! Placeholder Remapping and latin1 Codec Benchmarks
//!
//! These run on every statement prepare/execute and on every text column of
//! a latin1 result set, so they are measured in isolation:
//! - Numbered placeholder rewriting
//! - Parameter binding through a placeholder map
//! - latin1 decode and encode

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dbcompat::{charset, ParameterRemapper, PlaceholderStyle};
use serde_json::{json, Value};

fn bench_remap_prepare(c: &mut Criterion) {
    let remapper = ParameterRemapper::new(PlaceholderStyle::Numbered);
    let short = "SELECT * FROM users WHERE id = $1";
    let wide = format!(
        "INSERT INTO events VALUES({})",
        (1..=64).rev().map(|i| format!("${i}")).collect::<Vec<_>>().join(", ")
    );

    c.bench_function("remap_prepare_single", |b| {
        b.iter(|| remapper.prepare(black_box(short)).unwrap());
    });

    c.bench_function("remap_prepare_64_params", |b| {
        b.iter(|| remapper.prepare(black_box(&wide)).unwrap());
    });
}

fn bench_remap_bind(c: &mut Criterion) {
    let prepared = ParameterRemapper::new(PlaceholderStyle::Numbered)
        .prepare("UPDATE t SET a = $2, b = $1, c = $2, d = $3 WHERE id = $4")
        .unwrap();
    let params: Vec<Value> = vec![json!("a"), json!(2), json!(null), json!(42)];

    c.bench_function("remap_bind_4_params", |b| {
        b.iter(|| prepared.bind(black_box(&params)).unwrap());
    });
}

fn bench_latin1(c: &mut Criterion) {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let text = charset::decode(&bytes);

    c.bench_function("latin1_decode_4k", |b| {
        b.iter(|| charset::decode(black_box(&bytes)));
    });

    c.bench_function("latin1_encode_4k", |b| {
        b.iter(|| charset::encode(black_box(&text)).unwrap());
    });
}

criterion_group!(benches, bench_remap_prepare, bench_remap_bind, bench_latin1);
criterion_main!(benches);
