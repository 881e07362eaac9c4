// Copyright (c) 2025-present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

use dnaver::codec::{Codec, CodecModel};
use dnaver::diff::ModificationOp;
use dnaver::redundancy::EvenParity;
use dnaver::segment::{bytes_to_bits, frame_content, slots_from_bits};
use dnaver::transcoder::{Transcoder, TranscoderConfig};

/// Package version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Print benchmark header with version and timestamp
fn print_benchmark_header() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let now = chrono::Utc::now();
        eprintln!("\n╔════════════════════════════════════════════════════════════╗");
        eprintln!(
            "║ dnaver benchmark v{}                                     ║",
            VERSION
        );
        eprintln!(
            "║ Run date: {}                              ║",
            now.format("%Y-%m-%d %H:%M:%S UTC")
        );
        eprintln!("║ Platform: {:<49} ║", std::env::consts::ARCH);
        eprintln!("╚════════════════════════════════════════════════════════════╝\n");
    });
}

// ============================================================================
// Inputs
// ============================================================================

/// Numbered tokens ("00000 00001 ..."); every 12-byte excerpt is unique.
fn generate_file(len: usize) -> Vec<u8> {
    (0..)
        .flat_map(|i: usize| format!("{:05} ", i).into_bytes())
        .take(len)
        .collect()
}

fn default_codec() -> Codec {
    Codec::new(CodecModel::default()).expect("default model is valid")
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    print_benchmark_header();
    let mut group = c.benchmark_group("encode");
    let codec = default_codec();
    let protected = default_codec().with_redundancy(EvenParity);

    // 15 bytes fill one default payload exactly; the rest measure throughput.
    for size in [15, 16, 150, 1024, 4096, 16384, 65536] {
        let data = generate_file(size);

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("indexed", size), &data, |b, data| {
            b.iter(|| codec.encode(black_box(data)));
        });

        group.bench_with_input(BenchmarkId::new("parity", size), &data, |b, data| {
            b.iter(|| protected.encode(black_box(data)));
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = default_codec();

    for size in [15, 150, 1024, 4096, 16384, 65536] {
        let data = generate_file(size);
        let artifact = codec.encode(&data).expect("encode succeeds");

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(
            BenchmarkId::new("indexed", size),
            artifact.sequences(),
            |b, sequences| {
                b.iter(|| codec.decode(black_box(sequences)));
            },
        );
    }

    group.finish();
}

fn bench_apply_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_edits");
    let codec = default_codec();

    for size in [1024, 16384, 65536] {
        let data = generate_file(size);
        let prior = codec.encode(&data).expect("encode succeeds");
        let middle = (size / 2 / 6) * 6;

        group.throughput(Throughput::Bytes(size as u64));

        let insert = ModificationOp::insert(&data[middle - 12..middle], b"inserted text".to_vec());
        group.bench_with_input(
            BenchmarkId::new("insert_middle", size),
            &(prior.sequences(), insert),
            |b, (sequences, op)| {
                b.iter(|| codec.apply_edits(black_box(sequences), std::slice::from_ref(op)));
            },
        );

        let front = ModificationOp::insert(Vec::<u8>::new(), b"preface ".to_vec());
        group.bench_with_input(
            BenchmarkId::new("insert_front", size),
            &(prior.sequences(), front),
            |b, (sequences, op)| {
                b.iter(|| codec.apply_edits(black_box(sequences), std::slice::from_ref(op)));
            },
        );

        let replace = ModificationOp::replace(
            &data[middle - 12..middle],
            data[middle..middle + 60].to_vec(),
            b"replacement".to_vec(),
        );
        group.bench_with_input(
            BenchmarkId::new("replace_middle", size),
            &(prior.sequences(), replace),
            |b, (sequences, op)| {
                b.iter(|| codec.apply_edits(black_box(sequences), std::slice::from_ref(op)));
            },
        );
    }

    group.finish();
}

fn bench_transcode_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("transcode_pair");
    let transcoder = Transcoder::new(TranscoderConfig::default()).expect("default rule is valid");

    for len in [140, 512, 4096] {
        let upper = slots_from_bits(&bytes_to_bits(&generate_file(len / 8)));
        let lower = slots_from_bits(&bytes_to_bits(&generate_file(len / 8 + 3)[3..]));
        let sequence = transcoder
            .encode_pair(&upper, &lower)
            .expect("equal lanes encode");

        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(
            BenchmarkId::new("encode", len),
            &(&upper, &lower),
            |b, (upper, lower)| {
                b.iter(|| transcoder.encode_pair(black_box(upper), black_box(lower)));
            },
        );

        group.bench_with_input(BenchmarkId::new("decode", len), &sequence, |b, seq| {
            b.iter(|| transcoder.decode_pair(black_box(seq), None));
        });
    }

    group.finish();
}

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");

    for size in [1024, 65536] {
        let bits = bytes_to_bits(&generate_file(size));
        let mut zeros = vec![false; 64];
        zeros.extend_from_slice(&bits);

        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("full", size), &bits, |b, bits| {
            b.iter(|| frame_content(black_box(bits), 120));
        });

        group.bench_with_input(BenchmarkId::new("zero_lead", size), &zeros, |b, bits| {
            b.iter(|| frame_content(black_box(bits), 120));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_apply_edits,
    bench_transcode_pair,
    bench_framing
);
criterion_main!(benches);
