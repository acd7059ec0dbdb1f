//! Benchmarks for playback and reconciliation

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use daycycle_core::{FrameTime, ManualClock, ROOT_DISPLAY_RATE, DEFAULT_TICK_RESOLUTION};
use daycycle_player::{
    NetRole, NetSyncConfig, NetworkSnapshot, PlaybackSettings, Player, ServerTimeSamples,
    TimelineBounds,
};

fn bounds() -> TimelineBounds {
    TimelineBounds {
        display_rate: ROOT_DISPLAY_RATE,
        tick_resolution: DEFAULT_TICK_RESOLUTION,
        start: FrameTime::ZERO,
        end: FrameTime::from_frame(24 * 60_000),
    }
}

fn player(role: NetRole, clock: &ManualClock) -> Player {
    let mut player = Player::with_config(role, NetSyncConfig::default(), Arc::new(clock.clone()));
    player
        .initialize(bounds(), PlaybackSettings::looping(1.0))
        .expect("valid bounds");
    player
}

fn bench_player_update(c: &mut Criterion) {
    let clock = ManualClock::new();
    let mut player = player(NetRole::Standalone, &clock);
    player.play();

    c.bench_function("player_update", |b| {
        b.iter(|| {
            player.update(black_box(0.016)).expect("timeline assigned");
            while player.pop_evaluation().is_some() {}
            black_box(player.current_time())
        })
    });
}

fn bench_passive_snapshot(c: &mut Criterion) {
    let clock = ManualClock::new();
    let mut authority = player(NetRole::Authority, &clock);
    let mut passive = player(NetRole::Passive, &clock);
    authority.play();

    c.bench_function("passive_snapshot_and_update", |b| {
        b.iter(|| {
            clock.advance(0.016);
            authority.update(0.016).expect("timeline assigned");
            while authority.pop_evaluation().is_some() {}
            passive.apply_snapshot(black_box(authority.snapshot()));
            passive.update(0.016).expect("timeline assigned");
            while passive.pop_evaluation().is_some() {}
        })
    });
}

fn bench_sample_estimate(c: &mut Criterion) {
    let mut samples = ServerTimeSamples::new(NetSyncConfig::default());
    let mut now = 0.0;

    c.bench_function("server_time_estimate", |b| {
        b.iter(|| {
            now += 0.05;
            samples.add(now + 0.001 * (now * 7.0).sin(), now);
            black_box(samples.estimate(now, 1.0, 1.0))
        })
    });
}

fn bench_snapshot_ordering(c: &mut Criterion) {
    let snapshots: Vec<NetworkSnapshot> = (0..64)
        .map(|i| NetworkSnapshot {
            position: FrameTime::from_frame(i * 10),
            ..Default::default()
        })
        .collect();

    c.bench_function("newest_snapshot", |b| {
        b.iter(|| {
            black_box(&snapshots)
                .iter()
                .max_by_key(|s| (s.serial, s.position))
                .copied()
        })
    });
}

criterion_group!(
    benches,
    bench_player_update,
    bench_passive_snapshot,
    bench_sample_estimate,
    bench_snapshot_ordering
);
criterion_main!(benches);
