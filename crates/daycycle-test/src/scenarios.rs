//! Shared scenario fixtures
//!
//! A small world with a sun track, a weather overlay gated by a condition
//! and a dawn chorus trigger, plus helpers to build configs and simulators
//! around it.

use std::sync::Arc;
use std::time::Duration;

use daycycle_compose::{Curve, InMemoryAssets, Keyframe, SubTimelineEntry, TimelineAsset, TimelineCollection};
use daycycle_core::DayCycleResult;
use daycycle_runtime::DayCycleConfig;

use crate::{ChaosConfig, SyncSimulator};

pub const SUN_ELEVATION: &str = "sun.elevation";
pub const FOG_DENSITY: &str = "fog.density";
pub const RAIN_CONDITION: &str = "weather.rain";

/// Assets for the standard world
pub fn standard_assets() -> Arc<InMemoryAssets> {
    let mut assets = InMemoryAssets::new();
    assets.insert(
        TimelineAsset::new("sun", 24.0)
            .with_channel(
                SUN_ELEVATION,
                Curve::new(vec![
                    Keyframe::new(0.0, -30.0),
                    Keyframe::new(6.0, 0.0),
                    Keyframe::new(12.0, 60.0),
                    Keyframe::new(18.0, 0.0),
                    Keyframe::new(24.0, -30.0),
                ]),
            )
            .with_trigger("dawn_chorus", 5.5)
            .with_trigger("curfew", 22.0),
    );
    // Authored over half a day; stretched across the whole root
    assets.insert(
        TimelineAsset::new("fog", 12.0)
            .with_channel(FOG_DENSITY, Curve::new(vec![Keyframe::new(0.0, 0.8), Keyframe::new(3.0, 0.1)]))
            .with_blend(1.0),
    );
    assets.insert(
        TimelineAsset::new("rain", 24.0)
            .with_channel(SUN_ELEVATION, Curve::constant(5.0))
            .with_channel(FOG_DENSITY, Curve::constant(0.9)),
    );
    Arc::new(assets)
}

pub fn standard_collection() -> TimelineCollection {
    TimelineCollection::new("world")
        .with_entry(SubTimelineEntry::new("sun"))
        .with_entry(SubTimelineEntry::new("fog"))
        .with_entry(
            SubTimelineEntry::new("rain")
                .with_bias(10)
                .with_condition(RAIN_CONDITION, true),
        )
}

/// Config running one hour of day per real second
pub fn fast_config() -> DayCycleConfig {
    DayCycleConfig {
        time_per_cycle: Duration::from_secs(24),
        ..Default::default()
    }
}

/// Simulator over the standard world with one passive node per link
pub fn simulator(config: DayCycleConfig, links: &[ChaosConfig]) -> DayCycleResult<SyncSimulator> {
    let mut sim = SyncSimulator::new(config, standard_assets())?;
    sim.authority_mut().add_collection(standard_collection());
    for link in links {
        let index = sim.add_passive(link.clone())?;
        sim.passive_mut(index).cycle.add_collection(standard_collection());
    }
    Ok(sim)
}

/// Drift the reconciliation protocol tolerates: the lag threshold plus the
/// worst one-way delay and one simulation step, in hours of day
pub fn drift_tolerance(config: &DayCycleConfig, link: &ChaosConfig, step: Duration) -> f32 {
    let latency = link.max_latency().unwrap_or(Duration::from_secs(1));
    let seconds = config.net_sync.threshold_seconds() as f32 + latency.as_secs_f32() + step.as_secs_f32();
    seconds * config.cycle_play_rate().abs()
}
