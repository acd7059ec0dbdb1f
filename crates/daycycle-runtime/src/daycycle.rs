//! Day cycle host - one node's playback loop
//!
//! [`DayCycle`] wires a [`Player`] to the composed [`RootTimeline`]:
//! 1. Gate host time by the tick interval
//! 2. Finish evaluations left over from the previous update
//! 3. Advance the player
//! 4. Evaluate queued requests inside an evaluation guard
//! 5. Replay latent actions
//! 6. Send explicit events and snapshots
//! 7. Collect notifications

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace};

use daycycle_blend::{StaticTimeBlender, StaticTimeContributor};
use daycycle_compose::{
    AssetResolver, Condition, CompositionChange, CompositionPhase, ConditionRegistry, Evaluation,
    FiredTrigger, RootTimeline, TimelineCollection,
};
use daycycle_core::{
    frame_time_to_hours, hours_to_frame_time, ChannelId, Clock, ConditionId, ContributorId,
    DayCycleResult, EvaluationRange, EvaluationRequest, FrameTime, OwnerId, QualifiedFrameTime,
    SystemClock, UpdatePositionMethod,
};
use daycycle_player::{
    ExplicitEvent, NetRole, NetworkSnapshot, Player, PlayerNotification, TimelineBounds,
};

use crate::{DayCycleConfig, OverrideIntervalHandle, TickGate, Transport};

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    /// Calls to `update`
    pub ticks: u64,
    /// Updates that actually advanced the player
    pub updates: u64,
    /// Ticks skipped while the world was paused
    pub paused_ticks: u64,
    /// Updates postponed because evaluations were still outstanding
    pub deferred_updates: u64,
    pub evaluations: u64,
    pub rebuilds: u64,
    pub events_sent: u64,
    pub snapshots_published: u64,
    pub events_received: u64,
    pub snapshots_received: u64,
    pub last_update_duration: Duration,
}

/// Day cycle for one node
pub struct DayCycle {
    config: DayCycleConfig,
    owner: OwnerId,
    player: Player,
    root: RootTimeline,
    registry: ConditionRegistry,
    blender: StaticTimeBlender,
    assets: Arc<dyn AssetResolver>,
    collections: Vec<TimelineCollection>,
    transport: Option<Box<dyn Transport>>,
    gate: TickGate,
    world_paused: bool,
    last_evaluation: Option<Evaluation>,
    fired: Vec<FiredTrigger>,
    notifications: VecDeque<PlayerNotification>,
    stats: RuntimeStats,
}

impl DayCycle {
    /// Create a day cycle driven by the system clock
    pub fn new(
        owner: OwnerId,
        role: NetRole,
        config: DayCycleConfig,
        assets: Arc<dyn AssetResolver>,
    ) -> DayCycleResult<Self> {
        Self::with_clock(owner, role, config, assets, Arc::new(SystemClock::new()))
    }

    /// Create a day cycle with an explicit wall clock
    pub fn with_clock(
        owner: OwnerId,
        role: NetRole,
        config: DayCycleConfig,
        assets: Arc<dyn AssetResolver>,
        clock: Arc<dyn Clock>,
    ) -> DayCycleResult<Self> {
        config.validate()?;

        let root = RootTimeline::new(config.day_length_hours).with_owner_bias(config.bias);
        let settings = config.player_settings();
        let mut player = Player::with_config(role, config.net_sync, clock);
        player.initialize(timeline_bounds(&root), settings)?;

        let gate = TickGate::new(
            settings.tick_interval.interval_seconds,
            config.update_interval_override,
        );

        let mut cycle = DayCycle {
            owner,
            player,
            root,
            registry: ConditionRegistry::new(owner),
            blender: StaticTimeBlender::new(config.day_length_hours),
            assets,
            collections: Vec::new(),
            transport: None,
            gate,
            world_paused: false,
            last_evaluation: None,
            fired: Vec::new(),
            notifications: VecDeque::new(),
            stats: RuntimeStats::default(),
            config,
        };

        if cycle.config.run_day_cycle && !role.is_passive() {
            cycle.player.play();
        }
        cycle.flush_evaluations();

        info!(
            "Day cycle for {:?} ({:?}): {}h day over {}, starting at {}h",
            owner,
            role,
            cycle.config.day_length_hours,
            humantime::format_duration(cycle.config.time_per_cycle),
            cycle.config.initial_time_of_day
        );
        Ok(cycle)
    }

    // ------------------------------------------------------------------
    // Update loop
    // ------------------------------------------------------------------

    /// Run one host tick of `delta_seconds`. Returns whether the player was
    /// advanced.
    pub fn update(&mut self, delta_seconds: f32) -> DayCycleResult<bool> {
        let started = Instant::now();
        self.stats.ticks += 1;

        if self.world_paused && !self.player.settings().tick_interval.tick_when_paused {
            self.stats.paused_ticks += 1;
            return Ok(false);
        }

        if let Some(transport) = &self.transport {
            self.player.set_one_way_latency(transport.one_way_latency());
        }

        // Outstanding work from a budget-limited flush goes first
        if self.player.has_pending_evaluations() {
            self.flush_evaluations();
            if self.player.has_pending_evaluations() {
                trace!("Evaluations still outstanding, deferring update");
                self.gate.defer(delta_seconds);
                self.stats.deferred_updates += 1;
                self.dispatch();
                return Ok(false);
            }
        }

        let Some(elapsed) = self.gate.accumulate(delta_seconds) else {
            return Ok(false);
        };

        self.player.update(elapsed)?;
        self.flush_evaluations();
        self.dispatch();

        self.stats.updates += 1;
        self.stats.last_update_duration = started.elapsed();
        Ok(true)
    }

    /// Evaluate queued requests within the evaluation budget, then replay
    /// deferred transport operations. Returns the number evaluated.
    fn flush_evaluations(&mut self) -> usize {
        let budget = self.player.settings().tick_interval.budget_seconds();
        let started = Instant::now();
        let mut count = 0;

        {
            let _guard = match self.player.begin_evaluation() {
                Ok(guard) => guard,
                Err(err) => {
                    error!("Cannot evaluate day cycle: {}", err);
                    return 0;
                }
            };

            while let Some(request) = self.player.pop_evaluation() {
                let evaluation = self.root.evaluate(&request);
                self.apply_evaluation(evaluation);
                count += 1;

                if let Some(budget) = budget {
                    if started.elapsed().as_secs_f64() >= budget {
                        trace!("Evaluation budget spent after {} request(s)", count);
                        break;
                    }
                }
            }
        }

        self.player.run_latent_actions();
        self.stats.evaluations += count as u64;
        count
    }

    fn apply_evaluation(&mut self, evaluation: Evaluation) {
        if !evaluation.invalidated.is_empty() {
            debug!("Sub-timelines changed activity: {:?}", evaluation.invalidated);
        }
        for trigger in &evaluation.triggers {
            trace!("Trigger {} fired in {} at {}", trigger.name, trigger.asset, trigger.time);
        }
        self.fired.extend(evaluation.triggers.iter().cloned());
        self.last_evaluation = Some(evaluation);
    }

    /// Re-evaluate the current position without firing triggers
    fn evaluate_current(&mut self) {
        let tick_resolution = self.player.tick_resolution();
        let request = EvaluationRequest {
            range: EvaluationRange::point(
                self.player.current_time().convert_to(tick_resolution),
                tick_resolution,
            ),
            status: self.player.status(),
            has_jumped: false,
            suppress_triggers_until: None,
        };
        let evaluation = self.root.evaluate(&request);
        self.apply_evaluation(evaluation);
    }

    /// Send queued events, publish the snapshot on the authority and collect
    /// notifications
    fn dispatch(&mut self) {
        while let Some(event) = self.player.pop_outgoing() {
            match self.transport.as_mut() {
                Some(transport) => {
                    trace!("Sending {} {}", event.name(), event.serial());
                    transport.send_reliable_ordered(event);
                    self.stats.events_sent += 1;
                }
                None => trace!("No transport, dropping {}", event.name()),
            }
        }

        if self.player.role().is_authority() {
            if let Some(transport) = self.transport.as_mut() {
                transport.publish_snapshot(self.player.snapshot());
                self.stats.snapshots_published += 1;
            }
        }

        while let Some(notification) = self.player.pop_notification() {
            debug!("Day cycle {:?}", notification);
            self.notifications.push_back(notification);
        }
    }

    /// Evaluate and dispatch right away after a transport change
    fn settle(&mut self) {
        self.flush_evaluations();
        self.dispatch();
    }

    // ------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------

    /// Add (or replace by name) a collection and rebuild
    pub fn add_collection(&mut self, collection: TimelineCollection) -> CompositionChange {
        match self.collections.iter_mut().find(|c| c.name == collection.name) {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
        self.rebuild()
    }

    pub fn remove_collection(&mut self, name: &str) -> Option<CompositionChange> {
        let index = self.collections.iter().position(|c| c.name == name)?;
        self.collections.remove(index);
        if self.collections.is_empty() {
            self.root.clear();
            self.stats.rebuilds += 1;
            self.evaluate_current();
            return Some(CompositionChange::Rebuilt {
                sections: 0,
                skipped: 0,
            });
        }
        Some(self.rebuild())
    }

    /// Recompose the root from the registered collections
    pub fn rebuild(&mut self) -> CompositionChange {
        let change = self
            .root
            .compose(&self.collections, self.assets.as_ref(), &mut self.registry);
        if let CompositionChange::Rebuilt { sections, skipped } = change {
            self.stats.rebuilds += 1;
            debug!("Composed {} section(s), {} skipped", sections, skipped);
        }
        self.evaluate_current();
        change
    }

    pub fn collections(&self) -> &[TimelineCollection] {
        &self.collections
    }

    /// Run `hook` before and after every full rebuild
    pub fn add_composition_hook<F>(&mut self, hook: F)
    where
        F: FnMut(CompositionPhase) + Send + 'static,
    {
        self.root.add_composition_hook(hook);
    }

    // ------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------

    pub fn set_transport(&mut self, transport: Box<dyn Transport>) {
        self.player.set_one_way_latency(transport.one_way_latency());
        self.transport = Some(transport);
    }

    pub fn clear_transport(&mut self) -> Option<Box<dyn Transport>> {
        self.transport.take()
    }

    /// Route a snapshot received from the authority
    pub fn receive_snapshot(&mut self, snapshot: NetworkSnapshot) {
        self.stats.snapshots_received += 1;
        self.player.apply_snapshot(snapshot);
        self.settle();
    }

    /// Route an explicit event received from the authority
    pub fn receive_event(&mut self, event: ExplicitEvent) {
        self.stats.events_received += 1;
        self.player.apply_event(event);
        self.settle();
    }

    // ------------------------------------------------------------------
    // Transport controls
    // ------------------------------------------------------------------

    pub fn play(&mut self) {
        self.player.play();
        self.settle();
    }

    pub fn pause(&mut self) {
        self.player.pause();
        self.settle();
    }

    pub fn stop(&mut self) {
        self.player.stop();
        self.settle();
    }

    /// Enter scrubbing at `hours`
    pub fn scrub(&mut self, hours: f32) {
        let time = self.hours_to_position(hours);
        self.player.scrub_to(time);
        self.settle();
    }

    /// Scale the configured cycle rate by `rate`; negative runs the day
    /// backwards
    pub fn set_play_rate(&mut self, rate: f32) {
        self.config.playback.play_rate = rate;
        self.player.set_play_rate(self.config.cycle_play_rate());
        self.settle();
    }

    pub fn play_rate(&self) -> f32 {
        self.config.playback.play_rate
    }

    /// Move to a display-rate position
    pub fn set_position(&mut self, time: FrameTime, method: UpdatePositionMethod) {
        self.player.set_playback_position(time, method);
        self.settle();
    }

    pub fn current_time(&self) -> QualifiedFrameTime {
        self.player.current_time()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.player.is_paused()
    }

    // ------------------------------------------------------------------
    // Time of day
    // ------------------------------------------------------------------

    /// Natural time of day in hours
    pub fn time_of_day(&self) -> f32 {
        frame_time_to_hours(self.player.current_time().time, self.player.display_rate())
    }

    /// Jump to `hours`, wrapped into the day
    pub fn set_time_of_day(&mut self, hours: f32) {
        let time = self.hours_to_position(hours);
        self.set_position(time, UpdatePositionMethod::Jump);
    }

    /// Time of day after static-time contributors are blended in
    pub fn apparent_time_of_day(&mut self) -> f32 {
        let natural = self.time_of_day();
        self.blender.apparent_time(natural)
    }

    pub fn day_length_hours(&self) -> f32 {
        self.config.day_length_hours
    }

    /// Change the day length, keeping the current position where possible
    pub fn set_day_length(&mut self, hours: f32) -> DayCycleResult<()> {
        let mut config = self.config.clone();
        config.day_length_hours = hours;
        config.initial_time_of_day = config.initial_time_of_day.min(hours * 0.5);
        config.validate()?;

        self.config = config;
        self.root.set_day_length(hours);
        self.blender.set_day_length(hours);
        self.player.set_frame_range(0, self.root.duration_frames(), 0.0);
        if !self.player.role().is_passive() {
            self.player.set_play_rate(self.config.cycle_play_rate());
        }
        self.evaluate_current();
        self.dispatch();
        Ok(())
    }

    fn hours_to_position(&self, hours: f32) -> FrameTime {
        let day = self.config.day_length_hours;
        let wrapped = if hours.is_finite() { hours.rem_euclid(day) } else { 0.0 };
        hours_to_frame_time(wrapped, self.player.display_rate())
            .clamp_to(FrameTime::ZERO, self.player.last_valid_time())
    }

    // ------------------------------------------------------------------
    // Static time and conditions
    // ------------------------------------------------------------------

    pub fn register_static_time_contributor(
        &mut self,
        owner: OwnerId,
        priority: i32,
        contributor: Arc<dyn StaticTimeContributor>,
    ) -> ContributorId {
        self.blender.register(owner, priority, contributor)
    }

    pub fn unregister_static_time_contributor(&mut self, id: ContributorId) -> bool {
        self.blender.unregister(id)
    }

    /// Drop every contributor registered by `owner`
    pub fn unregister_static_time_owner(&mut self, owner: OwnerId) -> usize {
        self.blender.unregister_owner(owner)
    }

    pub fn blender(&self) -> &StaticTimeBlender {
        &self.blender
    }

    pub fn register_condition<F>(&mut self, id: impl Into<ConditionId>, factory: F)
    where
        F: Fn() -> Box<dyn Condition> + Send + Sync + 'static,
    {
        self.registry.register(id, factory);
    }

    pub fn register_flag(&mut self, id: impl Into<ConditionId>, initial: bool) {
        self.registry.register_flag(id, initial);
    }

    /// Set a condition's value; dependent sub-timelines follow at once
    pub fn set_condition(&mut self, id: &ConditionId, value: bool) -> DayCycleResult<bool> {
        let changed = self.registry.set_value(id, value)?;
        if changed {
            self.evaluate_current();
        }
        Ok(changed)
    }

    /// Initialise conditions that were waiting for the game state
    pub fn mark_game_state_ready(&mut self) {
        self.registry.mark_game_state_ready();
        self.root.refresh(&self.registry);
        self.evaluate_current();
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Outputs
    // ------------------------------------------------------------------

    /// Channel value at the last evaluated position
    pub fn channel_value(&self, channel: &ChannelId) -> Option<f32> {
        self.last_evaluation
            .as_ref()
            .and_then(|e| e.channels.get(channel).copied())
    }

    pub fn last_evaluation(&self) -> Option<&Evaluation> {
        self.last_evaluation.as_ref()
    }

    /// Drain triggers fired since the last call
    pub fn fired_triggers(&mut self) -> Vec<FiredTrigger> {
        std::mem::take(&mut self.fired)
    }

    pub fn pop_notification(&mut self) -> Option<PlayerNotification> {
        self.notifications.pop_front()
    }

    // ------------------------------------------------------------------
    // Host integration
    // ------------------------------------------------------------------

    pub fn set_world_paused(&mut self, paused: bool) {
        self.world_paused = paused;
    }

    pub fn is_world_paused(&self) -> bool {
        self.world_paused
    }

    /// World time dilation applied to the cycle
    pub fn set_time_dilation(&mut self, dilation: f32) {
        self.player.set_time_dilation(dilation);
    }

    /// Change how much host time accumulates before an update runs
    pub fn set_update_interval(&mut self, seconds: f32) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.config.playback.tick_interval.interval_seconds = seconds;
        self.gate.set_interval(seconds);
    }

    /// Update at the override interval until the handle is dropped
    pub fn request_update_interval_override(&self) -> OverrideIntervalHandle {
        self.gate.request_override()
    }

    pub fn effective_update_interval(&self) -> f32 {
        self.gate.effective_interval()
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn config(&self) -> &DayCycleConfig {
        &self.config
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn root(&self) -> &RootTimeline {
        &self.root
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }
}

impl std::fmt::Debug for DayCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayCycle")
            .field("owner", &self.owner)
            .field("player", &self.player)
            .field("root", &self.root)
            .field("collections", &self.collections.len())
            .field("world_paused", &self.world_paused)
            .finish()
    }
}

fn timeline_bounds(root: &RootTimeline) -> TimelineBounds {
    TimelineBounds {
        display_rate: root.display_rate(),
        tick_resolution: root.tick_resolution(),
        start: FrameTime::ZERO,
        end: root.end_ticks(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use daycycle_blend::StaticTimeRequest;
    use daycycle_compose::{Curve, InMemoryAssets, Keyframe, SubTimelineEntry, TimelineAsset};
    use daycycle_core::{ManualClock, PlayerStatus};

    use crate::RecordingTransport;

    /// One root second per real second
    fn config() -> DayCycleConfig {
        DayCycleConfig {
            time_per_cycle: Duration::from_secs(24),
            ..Default::default()
        }
    }

    fn assets() -> Arc<InMemoryAssets> {
        let mut assets = InMemoryAssets::new();
        assets.insert(
            TimelineAsset::new("sun", 24.0)
                .with_channel(
                    "sun.elevation",
                    Curve::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(12.0, 90.0), Keyframe::new(24.0, 0.0)]),
                )
                .with_trigger("sunrise", 7.0),
        );
        assets.insert(
            TimelineAsset::new("overcast", 24.0).with_channel("sun.elevation", Curve::constant(10.0)),
        );
        Arc::new(assets)
    }

    fn collection() -> TimelineCollection {
        TimelineCollection::new("world")
            .with_entry(SubTimelineEntry::new("sun"))
            .with_entry(
                SubTimelineEntry::new("overcast")
                    .with_bias(1)
                    .with_condition("weather.overcast", true),
            )
    }

    fn cycle(role: NetRole, config: DayCycleConfig) -> DayCycle {
        let clock = Arc::new(ManualClock::new());
        DayCycle::with_clock(OwnerId(1), role, config, assets(), clock).unwrap()
    }

    #[test]
    fn test_day_cycle_creation() {
        let cycle = cycle(NetRole::Standalone, config());
        assert!(cycle.is_playing());
        assert_eq!(cycle.time_of_day(), 6.0);
        assert_eq!(cycle.player().frame_duration(), 2400);
        assert_eq!(cycle.stats().ticks, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DayCycleConfig {
            day_length_hours: -1.0,
            ..Default::default()
        };
        let result = DayCycle::new(OwnerId(1), NetRole::Standalone, config, assets());
        assert!(result.is_err());
    }

    #[test]
    fn test_update_advances_and_evaluates() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.add_collection(collection());
        assert_eq!(cycle.channel_value(&ChannelId::new("sun.elevation")), Some(45.0));

        assert!(cycle.update(1.5).unwrap());
        assert!((cycle.time_of_day() - 7.5).abs() < 1e-3);

        let fired = cycle.fired_triggers();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, "sunrise");
        assert!(cycle.fired_triggers().is_empty());
        assert_eq!(cycle.stats().updates, 1);
    }

    #[test]
    fn test_day_wraps_around() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.set_time_of_day(23.0);
        cycle.update(2.0).unwrap();
        assert!((cycle.time_of_day() - 1.0).abs() < 1e-3);
        assert_eq!(cycle.player().current_loops(), 1);
        assert!(cycle.is_playing());
    }

    #[test]
    fn test_condition_switches_overlay() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.register_flag("weather.overcast", false);
        cycle.add_collection(collection());
        let elevation = ChannelId::new("sun.elevation");
        assert_eq!(cycle.channel_value(&elevation), Some(45.0));

        assert!(cycle
            .set_condition(&ConditionId::new("weather.overcast"), true)
            .unwrap());
        assert_eq!(cycle.channel_value(&elevation), Some(10.0));
        assert_eq!(
            cycle.last_evaluation().unwrap().invalidated,
            vec![daycycle_core::AssetId::new("overcast")]
        );
    }

    #[test]
    fn test_unknown_condition_is_an_error() {
        let mut cycle = cycle(NetRole::Standalone, config());
        assert!(cycle.set_condition(&ConditionId::new("nope"), true).is_err());
    }

    #[test]
    fn test_collection_replace_and_remove() {
        let hooks = Arc::new(AtomicUsize::new(0));
        let mut cycle = cycle(NetRole::Standalone, config());
        let counter = hooks.clone();
        cycle.add_composition_hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cycle.add_collection(collection());
        assert_eq!(cycle.rebuild(), CompositionChange::Reused);
        assert_eq!(hooks.load(Ordering::SeqCst), 2);

        cycle.add_collection(TimelineCollection::new("world").with_entry(SubTimelineEntry::new("sun")));
        assert_eq!(cycle.collections().len(), 1);
        assert_eq!(cycle.root().sections().len(), 1);

        assert!(cycle.remove_collection("world").is_some());
        assert!(cycle.root().sections().is_empty());
        assert_eq!(cycle.channel_value(&ChannelId::new("sun.elevation")), None);
        assert!(cycle.remove_collection("world").is_none());
    }

    #[test]
    fn test_world_pause_holds_time() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.set_world_paused(true);
        assert!(!cycle.update(1.0).unwrap());
        assert_eq!(cycle.time_of_day(), 6.0);
        assert_eq!(cycle.stats().paused_ticks, 1);

        let mut config = config();
        config.playback.tick_interval.tick_when_paused = true;
        let mut ticking = self::cycle(NetRole::Standalone, config);
        ticking.set_world_paused(true);
        assert!(ticking.update(1.0).unwrap());
        assert!((ticking.time_of_day() - 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_tick_interval_and_override() {
        let mut config = config();
        config.playback.tick_interval.interval_seconds = 1.0;
        let mut cycle = cycle(NetRole::Standalone, config);

        assert!(!cycle.update(0.5).unwrap());
        assert!(cycle.update(0.5).unwrap());
        assert!((cycle.time_of_day() - 7.0).abs() < 1e-3);

        let handle = cycle.request_update_interval_override();
        assert_eq!(cycle.effective_update_interval(), 0.05);
        assert!(cycle.update(0.1).unwrap());
        drop(handle);
        assert_eq!(cycle.effective_update_interval(), 1.0);

        cycle.set_update_interval(0.25);
        assert_eq!(cycle.effective_update_interval(), 0.25);
        assert_eq!(cycle.config().playback.tick_interval.interval_seconds, 0.25);
        assert!(cycle.update(0.25).unwrap());
    }

    #[test]
    fn test_transport_controls() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.pause();
        assert!(cycle.is_paused());
        cycle.update(1.0).unwrap();
        assert_eq!(cycle.time_of_day(), 6.0);

        cycle.scrub(20.0);
        assert_eq!(cycle.player().status(), PlayerStatus::Scrubbing);
        assert_eq!(cycle.time_of_day(), 20.0);

        cycle.play();
        cycle.set_play_rate(-1.0);
        cycle.update(1.0).unwrap();
        assert!((cycle.time_of_day() - 19.0).abs() < 1e-3);

        cycle.stop();
        assert!(!cycle.is_playing());
        assert_eq!(cycle.time_of_day(), 0.0);
        assert_eq!(cycle.pop_notification(), Some(PlayerNotification::Played));
        assert_eq!(cycle.pop_notification(), Some(PlayerNotification::Paused));
    }

    #[test]
    fn test_set_time_of_day_wraps() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.set_time_of_day(-2.0);
        assert_eq!(cycle.time_of_day(), 22.0);
        cycle.set_time_of_day(30.0);
        assert_eq!(cycle.time_of_day(), 6.0);
    }

    #[test]
    fn test_static_time_contributors() {
        let mut cycle = cycle(NetRole::Standalone, config());
        let high = cycle.register_static_time_contributor(
            OwnerId(2),
            10,
            Arc::new(StaticTimeRequest::new(1.0, 6.0)),
        );
        cycle.register_static_time_contributor(OwnerId(3), 5, Arc::new(StaticTimeRequest::new(1.0, 18.0)));
        cycle.set_time_of_day(12.0);
        assert_eq!(cycle.apparent_time_of_day(), 6.0);

        assert!(cycle.unregister_static_time_contributor(high));
        assert_eq!(cycle.apparent_time_of_day(), 18.0);
        assert_eq!(cycle.unregister_static_time_owner(OwnerId(3)), 1);
        assert_eq!(cycle.apparent_time_of_day(), 12.0);
    }

    #[test]
    fn test_set_day_length() {
        let mut cycle = cycle(NetRole::Standalone, config());
        cycle.set_time_of_day(18.0);
        cycle.set_day_length(12.0).unwrap();
        assert_eq!(cycle.player().frame_duration(), 1200);
        assert!(cycle.time_of_day() < 12.0);
        assert!(cycle.set_day_length(0.0).is_err());
        assert_eq!(cycle.day_length_hours(), 12.0);
    }

    #[test]
    fn test_authority_publishes() {
        let transport = RecordingTransport::new();
        let mut cycle = cycle(NetRole::Authority, config());
        cycle.set_transport(Box::new(transport.clone()));

        cycle.update(1.0).unwrap();
        assert_eq!(transport.take_snapshots().len(), 1);

        cycle.set_time_of_day(12.0);
        let events = transport.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            ExplicitEvent::PositionUpdate {
                method: UpdatePositionMethod::Jump,
                ..
            }
        ));
        assert!(cycle.stats().events_sent >= 1);
    }

    #[test]
    fn test_passive_follows_received_state() {
        let authority_link = RecordingTransport::new();
        let mut authority = cycle(NetRole::Authority, config());
        authority.set_transport(Box::new(authority_link.clone()));

        let mut passive = cycle(NetRole::Passive, config());
        assert!(!passive.is_playing());

        authority.update(0.5).unwrap();
        passive.receive_snapshot(authority_link.latest_snapshot().unwrap());
        assert!(passive.is_playing());

        authority.set_time_of_day(15.0);
        for event in authority_link.take_events() {
            passive.receive_event(event);
        }
        assert_eq!(passive.time_of_day(), 15.0);
        assert_eq!(passive.stats().events_received, 1);
    }
}
