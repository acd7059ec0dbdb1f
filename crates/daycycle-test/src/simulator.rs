//! Multi-node day cycle simulator
//!
//! One authority and any number of passive nodes share a [`ManualClock`].
//! Each passive node is fed through its own [`ChaosLink`] (snapshots) and
//! [`ReliableLink`] (explicit events).

use std::sync::Arc;
use std::time::Duration;

use daycycle_blend::shortest_delta;
use daycycle_core::{DayCycleResult, ManualClock, OwnerId};
use daycycle_player::{ExplicitEvent, NetRole, NetworkSnapshot};
use daycycle_runtime::{AssetResolver, DayCycle, DayCycleConfig, RecordingTransport};

use crate::{ChaosConfig, ChaosLink, ReliableLink};

/// A passive node and the links feeding it
pub struct PassiveNode {
    pub cycle: DayCycle,
    snapshots: ChaosLink<NetworkSnapshot>,
    events: ReliableLink<ExplicitEvent>,
}

impl PassiveNode {
    pub fn snapshot_link(&self) -> &ChaosLink<NetworkSnapshot> {
        &self.snapshots
    }

    pub fn event_link(&self) -> &ReliableLink<ExplicitEvent> {
        &self.events
    }
}

/// Drift observed during a run, in hours of day
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    pub steps: u64,
    /// Largest drift over all steps after the warm-up
    pub max_drift: f32,
    /// Drift per passive node after the last step
    pub final_drift: Vec<f32>,
}

impl SyncReport {
    pub fn converged_within(&self, tolerance: f32) -> bool {
        self.final_drift.iter().all(|d| d.abs() <= tolerance)
    }
}

pub struct SyncSimulator {
    clock: Arc<ManualClock>,
    authority: DayCycle,
    outbox: RecordingTransport,
    passives: Vec<PassiveNode>,
    config: DayCycleConfig,
    assets: Arc<dyn AssetResolver>,
    seed_counter: u64,
}

impl SyncSimulator {
    pub fn new(config: DayCycleConfig, assets: Arc<dyn AssetResolver>) -> DayCycleResult<Self> {
        let clock = Arc::new(ManualClock::new());
        let outbox = RecordingTransport::new();
        let mut authority = DayCycle::with_clock(
            OwnerId(0),
            NetRole::Authority,
            config.clone(),
            assets.clone(),
            clock.clone(),
        )?;
        authority.set_transport(Box::new(outbox.clone()));

        Ok(SyncSimulator {
            clock,
            authority,
            outbox,
            passives: Vec::new(),
            config,
            assets,
            seed_counter: 1,
        })
    }

    /// Add a passive node behind `link`; returns its index
    pub fn add_passive(&mut self, link: ChaosConfig) -> DayCycleResult<usize> {
        let index = self.passives.len();
        let mut cycle = DayCycle::with_clock(
            OwnerId(index as u64 + 1),
            NetRole::Passive,
            self.config.clone(),
            self.assets.clone(),
            self.clock.clone(),
        )?;
        cycle.set_transport(Box::new(RecordingTransport::with_latency(
            link.base_latency.as_secs_f32(),
        )));

        let seed = self.seed_counter;
        self.seed_counter += 2;
        let events = ReliableLink::with_jitter(link.base_latency, link.jitter.clone(), seed + 1);
        self.passives.push(PassiveNode {
            cycle,
            snapshots: ChaosLink::new(link, seed),
            events,
        });
        Ok(index)
    }

    /// Advance every node by `dt`
    pub fn step(&mut self, dt: Duration) -> DayCycleResult<()> {
        let seconds = dt.as_secs_f32();
        self.clock.advance(dt.as_secs_f64());

        self.authority.update(seconds)?;
        self.flush_outbox();

        for node in &mut self.passives {
            for event in node.events.tick(dt) {
                node.cycle.receive_event(event);
            }
            for snapshot in node.snapshots.tick(dt) {
                node.cycle.receive_snapshot(snapshot);
            }
            node.cycle.update(seconds)?;
        }
        Ok(())
    }

    /// Hand everything the authority sent to the passive links
    fn flush_outbox(&mut self) {
        let events = self.outbox.take_events();
        let snapshots = self.outbox.take_snapshots();
        for node in &mut self.passives {
            for event in &events {
                node.events.send(*event);
            }
            // Only the newest snapshot of a step is worth sending
            if let Some(snapshot) = snapshots.last() {
                node.snapshots.send(*snapshot);
            }
        }
    }

    /// Run `steps` steps of `dt`, measuring drift once `warm_up` steps
    /// have passed
    pub fn run(&mut self, steps: u64, dt: Duration, warm_up: u64) -> DayCycleResult<SyncReport> {
        let mut report = SyncReport::default();
        for step in 0..steps {
            self.step(dt)?;
            report.steps += 1;
            if step >= warm_up {
                let drift = self.max_drift();
                report.max_drift = report.max_drift.max(drift);
            }
        }
        report.final_drift = (0..self.passives.len()).map(|i| self.drift(i)).collect();
        Ok(report)
    }

    /// Signed drift of passive `index` from the authority, in hours, the
    /// short way round the day
    pub fn drift(&self, index: usize) -> f32 {
        let day = self.authority.day_length_hours();
        let authority = self.authority.time_of_day();
        let passive = self.passives[index].cycle.time_of_day();
        shortest_delta(authority, passive, day)
    }

    pub fn max_drift(&self) -> f32 {
        (0..self.passives.len())
            .map(|i| self.drift(i).abs())
            .fold(0.0, f32::max)
    }

    pub fn authority(&self) -> &DayCycle {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut DayCycle {
        &mut self.authority
    }

    pub fn passive(&self, index: usize) -> &PassiveNode {
        &self.passives[index]
    }

    pub fn passive_mut(&mut self, index: usize) -> &mut PassiveNode {
        &mut self.passives[index]
    }

    pub fn passive_count(&self) -> usize {
        self.passives.len()
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }
}
