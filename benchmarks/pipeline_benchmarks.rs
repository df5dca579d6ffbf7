//! Criterion benchmarks for the per-frame hot path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{Rgb, RgbImage};
use proxalert::{Candidate, OutputDecoder, OutputLayout, Preprocessor, RawOutput, Rect, Suppressor};

/// Full-size output with `hits` confident rows spread across the tensor
fn output_with_hits(hits: usize) -> RawOutput {
    let layout = OutputLayout::yolov5_coco();
    let mut output = RawOutput::zeros(layout);
    let stride = layout.rows() / hits.max(1);
    for i in 0..hits {
        let Some(row) = output.row_mut(i * stride) else {
            continue;
        };
        let offset = (i % 20) as f32 * 30.0;
        row[..5].copy_from_slice(&[40.0 + offset, 40.0 + offset, 60.0, 80.0, 0.8]);
        row[5 + i % 80] = 0.7;
    }
    output
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let decoder = OutputDecoder::default();

    for hits in [0usize, 50, 500] {
        let output = output_with_hits(hits);
        group.throughput(Throughput::Elements(output.layout().rows() as u64));
        group.bench_with_input(BenchmarkId::new("yolov5_coco", hits), &output, |b, output| {
            b.iter(|| decoder.decode(black_box(output), 1280, 1280));
        });
    }
    group.finish();
}

fn bench_suppression(c: &mut Criterion) {
    let mut group = c.benchmark_group("suppression");
    let suppressor = Suppressor::default();

    for count in [10usize, 100, 1000] {
        let candidates: Vec<Candidate> = (0..count)
            .map(|i| {
                let x = (i % 32) as i32 * 20;
                let y = (i / 32) as i32 * 20;
                Candidate::new(i % 80, 0.3 + (i % 7) as f32 * 0.1, Rect::new(x, y, 40, 40))
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("nms", count), &candidates, |b, candidates| {
            b.iter(|| suppressor.suppress(black_box(candidates)));
        });
    }
    group.finish();
}

fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");
    let preprocessor = Preprocessor::default();

    let test_cases = [("480p", 640u32, 480u32), ("720p", 1280, 720), ("1080p", 1920, 1080)];
    for (name, width, height) in test_cases {
        let frame = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        group.throughput(Throughput::Elements((width * height) as u64));
        group.bench_with_input(BenchmarkId::new("letterbox_blob", name), &frame, |b, frame| {
            b.iter(|| preprocessor.process(black_box(frame)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_suppression, bench_preprocessing);
criterion_main!(benches);
