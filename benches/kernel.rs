use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tubecity::amp::{ParameterAddress, ParameterEvent, TubeKernel};

const SAMPLE_RATE: f64 = 48000.0;

fn build_kernel(channels: usize, block_size: usize) -> TubeKernel {
    let mut kernel = TubeKernel::new();
    kernel.set_maximum_frames_to_render(block_size);
    kernel.initialize(channels, channels, SAMPLE_RATE);
    kernel.set(ParameterAddress::TubeGain, 1.6);
    kernel.set(ParameterAddress::NeutralTube, 0.5);
    kernel.set(ParameterAddress::WarmTube, 0.7);
    kernel.set(ParameterAddress::AggressiveTube, 0.4);
    kernel
}

fn sine(len: usize) -> Vec<f32> {
    let step = 2.0 * std::f32::consts::PI * 220.0 / SAMPLE_RATE as f32;
    (0..len).map(|i| (i as f32 * step).sin() * 0.8).collect()
}

fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("Kernel Block Size");

    for &block_size in &[64usize, 128, 256, 512, 1024] {
        group.bench_with_input(
            BenchmarkId::new("stereo", block_size),
            &block_size,
            |b, &block_size| {
                let mut kernel = build_kernel(2, block_size);
                let left = sine(block_size);
                let right = sine(block_size);
                let mut out_l = vec![0.0f32; block_size];
                let mut out_r = vec![0.0f32; block_size];

                b.iter(|| {
                    kernel.process(
                        black_box(&[&left[..], &right[..]]),
                        &mut [&mut out_l[..], &mut out_r[..]],
                        block_size,
                    );
                    black_box(&out_l);
                });
            },
        );
    }

    group.finish();
}

fn bench_events(c: &mut Criterion) {
    const BLOCK: usize = 512;
    let mut group = c.benchmark_group("Kernel Events");

    for &count in &[0usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("events", count), &count, |b, &count| {
            let mut kernel = build_kernel(1, BLOCK);
            let input = sine(BLOCK);
            let mut output = vec![0.0f32; BLOCK];
            let events: Vec<ParameterEvent> = (0..count)
                .map(|i| {
                    let value = if i % 2 == 0 { 1.2 } else { 1.8 };
                    ParameterEvent::new(i * BLOCK / count, ParameterAddress::TubeGain, value)
                })
                .collect();

            b.iter(|| {
                kernel.process_with_events(
                    black_box(&[&input[..]]),
                    &mut [&mut output[..]],
                    BLOCK,
                    black_box(&events),
                );
                black_box(&output);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_block_sizes, bench_events);
criterion_main!(benches);
