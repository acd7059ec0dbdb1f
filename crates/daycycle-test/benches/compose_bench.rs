//! Benchmarks for composition and evaluation

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use daycycle_compose::{
    ConditionRegistry, Curve, InMemoryAssets, Keyframe, RootTimeline, SubTimelineEntry,
    TimelineAsset, TimelineCollection,
};
use daycycle_core::{
    hours_to_frame_time, ConditionId, EvaluationRange, EvaluationRequest, OwnerId, PlayerStatus,
    DEFAULT_TICK_RESOLUTION,
};

fn world(layers: usize) -> (InMemoryAssets, TimelineCollection) {
    let mut assets = InMemoryAssets::new();
    let mut collection = TimelineCollection::new("bench");
    for i in 0..layers {
        let keys = (0..=24)
            .map(|h| Keyframe::new(h as f32, (h as f32 * 0.3 + i as f32).sin()))
            .collect();
        let name = format!("layer{}", i);
        assets.insert(
            TimelineAsset::new(name.as_str(), 24.0)
                .with_channel("light.intensity", Curve::new(keys))
                .with_channel("fog.density", Curve::constant(i as f32))
                .with_trigger(format!("cue{}", i), (i % 24) as f32 + 0.5),
        );
        collection = collection.with_entry(
            SubTimelineEntry::new(name.as_str())
                .with_bias(i as i32 % 4)
                .with_condition(format!("cond{}", i % 3), true),
        );
    }
    (assets, collection)
}

fn registry() -> ConditionRegistry {
    let mut registry = ConditionRegistry::new(OwnerId(1));
    for i in 0..3 {
        registry.register_flag(format!("cond{}", i), i != 2);
    }
    registry
}

fn request(from: f32, to: f32) -> EvaluationRequest {
    EvaluationRequest {
        range: EvaluationRange::sweep(
            hours_to_frame_time(from, DEFAULT_TICK_RESOLUTION),
            hours_to_frame_time(to, DEFAULT_TICK_RESOLUTION),
            DEFAULT_TICK_RESOLUTION,
        ),
        status: PlayerStatus::Playing,
        has_jumped: false,
        suppress_triggers_until: None,
    }
}

fn bench_compose_rebuild(c: &mut Criterion) {
    let (assets, collection) = world(32);
    let collections = [collection];

    c.bench_function("compose_rebuild_32", |b| {
        b.iter(|| {
            let mut registry = registry();
            let mut root = RootTimeline::new(24.0);
            black_box(root.compose(&collections, &assets, &mut registry))
        })
    });
}

fn bench_compose_reused(c: &mut Criterion) {
    let (assets, collection) = world(32);
    let collections = [collection];
    let mut registry = registry();
    let mut root = RootTimeline::new(24.0);
    root.compose(&collections, &assets, &mut registry);

    c.bench_function("compose_reused_32", |b| {
        b.iter(|| black_box(root.compose(&collections, &assets, &mut registry)))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let (assets, collection) = world(32);
    let mut registry = registry();
    let mut root = RootTimeline::new(24.0);
    root.compose(&[collection], &assets, &mut registry);

    c.bench_function("evaluate_sweep_32", |b| {
        let mut hour = 0.0f32;
        b.iter(|| {
            let from = hour;
            hour = (hour + 0.25) % 24.0;
            black_box(root.evaluate(&request(from, from + 0.25)))
        })
    });
}

fn bench_condition_broadcast(c: &mut Criterion) {
    let (assets, collection) = world(32);
    let mut registry = registry();
    let mut root = RootTimeline::new(24.0);
    root.compose(&[collection], &assets, &mut registry);
    let id = ConditionId::new("cond0");

    c.bench_function("condition_broadcast_32", |b| {
        let mut value = false;
        b.iter(|| {
            value = !value;
            black_box(registry.set_value(&id, value))
        })
    });
}

criterion_group!(
    benches,
    bench_compose_rebuild,
    bench_compose_reused,
    bench_evaluate,
    bench_condition_broadcast
);
criterion_main!(benches);
