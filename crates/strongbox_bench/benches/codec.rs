//! Record codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strongbox_bench::generate_events;
use strongbox_codec::{decode_record, encode_record, RecordEncoder};
use strongbox_core::EncoderPool;
use strongbox_testkit::Event;

/// Benchmark encoding with a fresh buffer, a reused encoder and the pool.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [64, 1024, 16 * 1024].iter() {
        let event = generate_events(1, *size).remove(0);
        group.throughput(Throughput::Bytes(*size as u64));

        group.bench_with_input(BenchmarkId::new("fresh", size), &event, |b, event| {
            b.iter(|| black_box(encode_record(7, black_box(event)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("reused", size), &event, |b, event| {
            let mut encoder = RecordEncoder::new();
            b.iter(|| {
                black_box(encoder.encode(7, black_box(event)).unwrap().len());
            });
        });

        group.bench_with_input(BenchmarkId::new("pooled", size), &event, |b, event| {
            let pool = EncoderPool::new(1024 * 1024, 64);
            b.iter(|| {
                let mut encoder = pool.acquire();
                black_box(encoder.encode(7, black_box(event)).unwrap().to_vec());
            });
        });
    }
    group.finish();
}

/// Benchmark decoding records.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for size in [64, 1024, 16 * 1024].iter() {
        let event = generate_events(1, *size).remove(0);
        let bytes = encode_record(7, &event).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let decoded: (u64, Event) = decode_record(black_box(bytes)).unwrap();
                black_box(decoded);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
