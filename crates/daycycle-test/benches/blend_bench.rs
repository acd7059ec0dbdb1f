//! Benchmarks for static-time blending

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use daycycle_blend::{shortest_delta, StaticTimeBlender, StaticTimeRequest};
use daycycle_core::OwnerId;

fn bench_apparent_time(c: &mut Criterion) {
    let mut blender = StaticTimeBlender::new(24.0);
    for i in 0..16 {
        blender.register(
            OwnerId(i),
            (i % 4) as i32,
            Arc::new(StaticTimeRequest::new(0.2, (i as f32 * 1.5) % 24.0)),
        );
    }

    c.bench_function("apparent_time_16", |b| {
        let mut natural = 0.0f32;
        b.iter(|| {
            natural = (natural + 0.01) % 24.0;
            black_box(blender.apparent_time(black_box(natural)))
        })
    });
}

fn bench_shortest_delta(c: &mut Criterion) {
    c.bench_function("shortest_delta", |b| {
        b.iter(|| shortest_delta(black_box(23.0), black_box(1.0), black_box(24.0)))
    });
}

criterion_group!(benches, bench_apparent_time, bench_shortest_delta);
criterion_main!(benches);
