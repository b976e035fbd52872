//! Benchmarks for the frame encoding hot path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use spdif_codec::{EncodedFrame, FrameEncoder, SampleFormat, SampleMask, BLOCK_FRAMES};

fn bench_encode_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");

    for frames in [BLOCK_FRAMES, 4 * BLOCK_FRAMES].iter() {
        group.throughput(Throughput::Elements(*frames as u64));

        group.bench_with_input(BenchmarkId::new("silence", frames), frames, |b, &frames| {
            let mut encoder = FrameEncoder::default();
            let mut out = vec![EncodedFrame::default(); frames];

            b.iter(|| {
                for dst in out.iter_mut() {
                    encoder.encode_silence(dst);
                }
                black_box(&out);
            });
        });

        group.bench_with_input(BenchmarkId::new("ramp", frames), frames, |b, &frames| {
            let mut encoder = FrameEncoder::default();
            encoder.set_sample_mask(SampleMask::for_depth(16));
            let mut out = vec![EncodedFrame::default(); frames];

            b.iter(|| {
                for (i, dst) in out.iter_mut().enumerate() {
                    let value = (i as i32) << 12;
                    encoder.encode_frame(dst, black_box((value, -value)));
                }
                black_box(&out);
            });
        });
    }

    group.finish();
}

fn bench_unpack_and_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_and_encode");

    for format in SampleFormat::ALL.iter() {
        let frame_bytes = format.frame_bytes();
        let pcm: Vec<u8> = (0..BLOCK_FRAMES * frame_bytes).map(|i| i as u8).collect();
        group.throughput(Throughput::Bytes(pcm.len() as u64));

        group.bench_function(format.name(), |b| {
            let unpacker = format.unpacker();
            let mut encoder = FrameEncoder::default();
            encoder.set_sample_mask(SampleMask::for_depth(format.bit_depth()));
            let mut out = vec![EncodedFrame::default(); BLOCK_FRAMES];

            b.iter(|| {
                for (src, dst) in pcm.chunks_exact(frame_bytes).zip(out.iter_mut()) {
                    encoder.encode_frame(dst, unpacker.unpack(src));
                }
                black_box(&out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode_frames, bench_unpack_and_encode);
criterion_main!(benches);
