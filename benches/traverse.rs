use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use wide::{f32x4, f32x8};

use sphereflake::camera::Camera;
use sphereflake::frustum::FrustumSource;
use sphereflake::packet::Lanes;
use sphereflake::sampler::{PixelBlock, SobolSampler};
use sphereflake::traversal::{Sphereflake, TraversalState};

const WIDTH: u32 = 256;
const HEIGHT: u32 = 192;

/// Trace 64 consecutive Sobol blocks through the default view.
fn trace_blocks<L: Lanes>(flake: &Sphereflake, sampler: &mut SobolSampler) -> u32 {
    let view = Camera::for_image(WIDTH, HEIGHT).frustum();
    let mut deepest = 0;
    for _ in 0..64 {
        let Some(block) = PixelBlock::<L>::at(sampler.next_point(), WIDTH, HEIGHT) else {
            continue;
        };
        let mut state = TraversalState::<L>::new();
        flake.trace(&block.rays(&view), &mut state);
        deepest = deepest.max(state.max_depth);
    }
    deepest
}

pub fn traverse_bench(c: &mut Criterion) {
    let flake = Sphereflake::default();
    let mut group = c.benchmark_group("traverse");

    group.throughput(Throughput::Elements(64));
    group.bench_function(BenchmarkId::new("lanes", 1), |b| {
        let mut sampler = SobolSampler::new([0x9e37_79b9, 0x7f4a_7c15]);
        b.iter(|| black_box(trace_blocks::<f32>(&flake, &mut sampler)))
    });

    group.throughput(Throughput::Elements(64 * 4));
    group.bench_function(BenchmarkId::new("lanes", 4), |b| {
        let mut sampler = SobolSampler::new([0x9e37_79b9, 0x7f4a_7c15]);
        b.iter(|| black_box(trace_blocks::<f32x4>(&flake, &mut sampler)))
    });

    group.throughput(Throughput::Elements(64 * 8));
    group.bench_function(BenchmarkId::new("lanes", 8), |b| {
        let mut sampler = SobolSampler::new([0x9e37_79b9, 0x7f4a_7c15]);
        b.iter(|| black_box(trace_blocks::<f32x8>(&flake, &mut sampler)))
    });

    group.finish();
}

criterion_group!(benches, traverse_bench);
criterion_main!(benches);
