//! Benchmarks for buffer encoding and streaming decode.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fecstream::sim::LossyLink;
use fecstream::{FecBlock, FecBufferEncoder, FecDecoder};

fn bench_data(len: usize) -> Vec<u8> {
    let mut state: u32 = 0xDEAD_BEEF;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let sizes: &[usize] = &[8 * 1400, 64 * 1400];
    let ratios: &[f32] = &[0.25, 0.5];

    let mut group = c.benchmark_group("buffer_encode");
    for &ratio in ratios {
        for &size in sizes {
            let data = bench_data(size);
            let label = format!("r{ratio}_{size}");
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(BenchmarkId::new("encode", &label), &data, |b, data| {
                let mut enc = FecBufferEncoder::new(1400, ratio);
                b.iter(|| black_box(enc.encode(data)));
            });
        }
    }
    group.finish();
}

fn decode_blocks(blocks: &[FecBlock], link: Option<&mut LossyLink>) -> usize {
    let mut dec = FecDecoder::new();
    match link {
        Some(link) => {
            for blk in blocks {
                if link.deliver() {
                    dec.submit(blk.as_bytes());
                }
            }
        }
        None => {
            for blk in blocks {
                dec.submit(blk.as_bytes());
            }
        }
    }
    let mut bytes = 0;
    while let Some(blk) = dec.take() {
        bytes += blk.data().len();
    }
    bytes
}

fn bench_decode(c: &mut Criterion) {
    let size = 64 * 1400;
    let data = bench_data(size);
    let mut enc = FecBufferEncoder::new(1400, 0.25);
    let blocks = enc.encode(&data);

    let mut group = c.benchmark_group("stream_decode");
    group.throughput(Throughput::Bytes(size as u64));
    group.bench_with_input(BenchmarkId::new("decode", "lossless"), &blocks, |b, blocks| {
        b.iter(|| black_box(decode_blocks(blocks, None)));
    });
    group.bench_with_input(
        BenchmarkId::new("decode", "drop_every_5"),
        &blocks,
        |b, blocks| {
            b.iter(|| {
                let mut link = LossyLink::drop_every(5);
                black_box(decode_blocks(blocks, Some(&mut link)))
            });
        },
    );
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
