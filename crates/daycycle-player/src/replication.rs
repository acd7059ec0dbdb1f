//! Network reconciliation
//!
//! Passive players follow the authority through two channels:
//! - snapshots: latest-wins, unordered, possibly stale
//! - explicit events: reliable, ordered, deduplicated by serial
//!
//! Small drift observed through snapshots is corrected at most once per
//! update, against a smoothed estimate of the authority's position.

use tracing::{debug, trace};

use daycycle_core::{FrameTime, PlayDirection, PlayerStatus, UpdatePositionMethod};

use crate::{
    ExplicitEvent, LatentAction, NetSyncConfig, NetworkSnapshot, Player, ServerTimeEstimate,
    ServerTimeSamples,
};

/// Reconciliation state owned by a player
#[derive(Clone, Debug)]
pub(crate) struct NetSync {
    /// Latest accepted authoritative snapshot
    pub(crate) observed: NetworkSnapshot,
    pub(crate) samples: ServerTimeSamples,
    /// Drift correction deferred to the next update
    pub(crate) pending_sync: bool,
    /// One-way latency to the authority, in seconds
    pub(crate) latency: f32,
    pub(crate) config: NetSyncConfig,
}

impl NetSync {
    pub(crate) fn new(config: NetSyncConfig) -> Self {
        NetSync {
            observed: NetworkSnapshot::default(),
            samples: ServerTimeSamples::new(config),
            pending_sync: false,
            latency: 0.0,
            config,
        }
    }
}

impl Player {
    /// Latest authoritative snapshot this player accepted
    pub fn observed_snapshot(&self) -> NetworkSnapshot {
        self.net.observed
    }

    pub fn net_sync_config(&self) -> &NetSyncConfig {
        &self.net.config
    }

    /// Number of retained server-time samples
    pub fn server_sample_count(&self) -> usize {
        self.net.samples.len()
    }

    /// One-way latency to the authority, as reported by the transport
    pub fn set_one_way_latency(&mut self, seconds: f32) {
        self.net.latency = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    /// How far the authority has moved while a message was in flight, in
    /// display frames (signed with the play direction)
    fn ping_lag(&self) -> FrameTime {
        let frames = self.net.latency as f64
            * self.display_rate().as_decimal()
            * self.play_rate() as f64
            * self.time_dilation() as f64;
        FrameTime::from_decimal(frames)
    }

    /// Drift tolerated before resynchronising, in display frames
    fn lag_threshold(&self) -> FrameTime {
        let frames = self.net.config.threshold_seconds()
            * self.display_rate().as_decimal()
            * self.play_rate().abs() as f64
            * self.time_dilation() as f64;
        FrameTime::from_decimal(frames)
    }

    /// Observe an authoritative snapshot (passive players only)
    pub fn apply_snapshot(&mut self, snapshot: NetworkSnapshot) {
        if !self.role().is_passive() || !self.has_timeline() {
            return;
        }
        if self.is_evaluating() {
            self.queue_latent_action(LatentAction::ApplySnapshot(snapshot));
            return;
        }
        if snapshot.serial < self.serial() {
            trace!(
                "Ignoring snapshot with old serial ({} < {})",
                snapshot.serial,
                self.serial()
            );
            return;
        }

        self.net.observed = snapshot;

        let status = self.status();
        let current = self.current_time().time;
        let started_playing = snapshot.status == PlayerStatus::Playing && status != PlayerStatus::Playing;
        let changed_status = snapshot.status != status;
        let changed_time = snapshot.position != current;

        if !changed_status && !changed_time {
            return;
        }

        let ping_lag = self.ping_lag();
        let threshold = self.lag_threshold();
        trace!(
            "Snapshot: local {} @ {}, authority {} @ {}",
            status,
            current,
            snapshot.status,
            snapshot.position
        );

        if started_playing {
            self.net.samples.reset();
            self.play_internal();

            let target = snapshot.position + ping_lag;
            if (self.current_time().time - target).abs() > threshold {
                debug!("Synchronising to authority at {} on start", target);
                self.move_position(target, UpdatePositionMethod::Play, true);
            }
            return;
        }

        if changed_time {
            match status {
                PlayerStatus::Playing => {
                    if changed_status {
                        self.move_position(
                            snapshot.position + ping_lag,
                            UpdatePositionMethod::Play,
                            true,
                        );
                    } else {
                        // One correction per update at most
                        self.net.pending_sync = true;
                    }
                }
                PlayerStatus::Scrubbing => {
                    self.move_position(snapshot.position, UpdatePositionMethod::Scrub, false);
                }
                PlayerStatus::Stopped => {
                    self.reset_position(snapshot.position);
                }
                PlayerStatus::Paused => {}
            }
        }

        if changed_status {
            self.net.samples.reset();
            match snapshot.status {
                PlayerStatus::Paused => self.pause(),
                PlayerStatus::Playing => self.play(),
                PlayerStatus::Scrubbing => self.scrub(),
                PlayerStatus::Stopped => {}
            }
        }
    }

    /// Apply a reliable event from the authority.
    ///
    /// Events at or below the local serial have already been applied and
    /// are dropped.
    pub fn apply_event(&mut self, event: ExplicitEvent) {
        if self.is_evaluating() {
            self.queue_latent_action(LatentAction::ApplyEvent(event));
            return;
        }

        let serial = event.serial();
        if serial <= self.serial() {
            trace!(
                "Discarding {} event with serial {} (local {})",
                event.name(),
                serial,
                self.serial()
            );
            return;
        }

        if self.role().authors_serials() {
            self.set_serial(serial);
            return;
        }
        if !self.has_timeline() {
            return;
        }

        self.set_serial(serial);
        debug!("Applying {} event {}", event.name(), serial);

        match event {
            ExplicitEvent::PositionUpdate { method, time, .. } => {
                self.net.samples.reset();
                self.move_position(time, method, false);
            }
            ExplicitEvent::Stopped { time, .. } => {
                self.net.samples.reset();
                let method = UpdatePositionMethod::for_status(self.status());

                // Catch up on loops the authority finished before stopping
                let missing_loops = self.net.observed.loop_count - self.current_loops();
                let loop_end = self.last_valid_time();
                for _ in 0..missing_loops.max(0) {
                    self.move_position(loop_end, method, false);
                }

                if self.current_time().time < time {
                    trace!("Catching up to stop time {}", time);
                    self.move_position(time, method, false);
                }
                self.stop_internal(time);
            }
            ExplicitEvent::Finished { time, .. } => {
                self.finish_playback(time);
            }
            ExplicitEvent::PlayRateChanged { rate, .. } => {
                self.net.samples.reset();
                self.set_play_rate_local(rate);
            }
        }
    }

    /// Deferred drift correction; runs at the start of each update
    pub(crate) fn update_network_sync(&mut self) {
        if !self.net.pending_sync {
            return;
        }
        self.net.pending_sync = false;

        if self.status() != PlayerStatus::Playing {
            return;
        }

        let ping_lag = self.ping_lag();
        let threshold = self.lag_threshold();
        let observed = self.net.observed;
        let current = self.current_time().time;

        // Fold loop differences in so a wrap on either side isn't mistaken
        // for a full-duration desync
        let loop_offset = observed.loop_count - self.current_loops();
        let offset_server = observed.position
            + ping_lag
            + FrameTime::from_frame(self.frame_duration() * loop_offset as i64);
        if loop_offset != 0 {
            self.net.samples.reset();
        }

        let display_rate = self.display_rate();
        let smoothed = if self.net.config.smoothing_enabled() {
            let now = self.clock.now_seconds();
            self.net
                .samples
                .add(display_rate.as_seconds(offset_server), now);
            match self
                .net
                .samples
                .estimate(now, self.play_rate(), self.time_dilation())
            {
                ServerTimeEstimate::Smoothed(seconds) => display_rate.as_frame_time(seconds),
                ServerTimeEstimate::Insufficient => current,
            }
        } else {
            offset_server
        };

        let difference = (current - smoothed).abs();
        if difference <= threshold + ping_lag.abs() {
            return;
        }

        debug!(
            "Correcting desynchronised position {} to {} (authority {} @ {}, latency {:.1}ms)",
            current,
            smoothed,
            observed.status,
            observed.position,
            self.net.latency * 1000.0
        );

        let last_position = self.position().to_output(current);
        let ahead = match PlayDirection::from_rate(self.play_rate()) {
            PlayDirection::Forwards => smoothed > current,
            PlayDirection::Backwards => smoothed < current,
        };

        if ahead {
            self.move_position(smoothed, UpdatePositionMethod::Play, true);
        } else {
            self.move_position(smoothed, UpdatePositionMethod::Jump, false);
        }

        self.request_skip_next_update();
        self.suppress_triggers_through(last_position);
    }

    /// Stop and forget everything observed from the authority
    pub fn rewind_for_replay(&mut self) {
        self.stop();
        self.net.observed = NetworkSnapshot::default();
        self.net.samples.reset();
        self.net.pending_sync = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use daycycle_core::{FrameRate, ManualClock, SerialNumber, ROOT_DISPLAY_RATE};

    use super::*;
    use crate::{PlaybackSettings, PlayerNotification, TimelineBounds};

    fn bounds() -> TimelineBounds {
        TimelineBounds {
            display_rate: ROOT_DISPLAY_RATE,
            tick_resolution: FrameRate::new(60_000, 1),
            start: FrameTime::ZERO,
            end: FrameTime::from_frame(24 * 60_000),
        }
    }

    fn node(role: crate::NetRole, config: NetSyncConfig, clock: &ManualClock) -> Player {
        let mut player = Player::with_config(role, config, Arc::new(clock.clone()));
        player
            .initialize(bounds(), PlaybackSettings::looping(1.0))
            .unwrap();
        player
    }

    fn deliver(authority: &mut Player, passive: &mut Player) {
        while let Some(event) = authority.pop_outgoing() {
            passive.apply_event(event);
        }
        passive.apply_snapshot(authority.snapshot());
    }

    #[test]
    fn test_stale_events_are_idempotent() {
        let clock = ManualClock::new();
        let mut authority = node(crate::NetRole::Authority, NetSyncConfig::default(), &clock);
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);

        authority.set_playback_position(FrameTime::from_frame(900), UpdatePositionMethod::Jump);
        let event = authority.pop_outgoing().unwrap();

        passive.apply_event(event);
        assert_eq!(passive.serial(), SerialNumber(1));
        assert_eq!(passive.current_time().time, FrameTime::from_frame(900));

        // Move locally, then replay the same event: nothing changes
        passive.set_playback_position(FrameTime::from_frame(100), UpdatePositionMethod::Jump);
        passive.apply_event(event);
        assert_eq!(passive.serial(), SerialNumber(1));
        assert_eq!(passive.current_time().time, FrameTime::from_frame(100));
    }

    #[test]
    fn test_stale_snapshot_ignored() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        passive.apply_event(ExplicitEvent::PositionUpdate {
            method: UpdatePositionMethod::Jump,
            time: FrameTime::from_frame(500),
            serial: SerialNumber(3),
        });

        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(10),
            status: PlayerStatus::Stopped,
            loop_count: 0,
            serial: SerialNumber(2),
        });
        assert_eq!(passive.current_time().time, FrameTime::from_frame(500));
        assert_eq!(passive.observed_snapshot().serial, SerialNumber::ZERO);
    }

    #[test]
    fn test_passive_starts_playing_from_snapshot() {
        let clock = ManualClock::new();
        let mut authority = node(crate::NetRole::Authority, NetSyncConfig::default(), &clock);
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);

        authority.play();
        authority.update(3.0).unwrap();
        deliver(&mut authority, &mut passive);

        assert!(passive.is_playing());
        let diff = (passive.current_time().time - authority.current_time().time).abs();
        assert!(diff.as_decimal() < 1e-3);
    }

    #[test]
    fn test_start_playing_snap_is_a_jump() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        while passive.pop_evaluation().is_some() {}

        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(1200),
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        assert!(passive.is_playing());
        assert_eq!(passive.current_time().time, FrameTime::from_frame(1200));

        let mut requests = Vec::new();
        while let Some(request) = passive.pop_evaluation() {
            requests.push(request);
        }
        let snap = requests.last().unwrap();
        assert!(snap.has_jumped);
        // Late joiners don't replay every trigger they skipped
        assert!(requests.iter().all(|r| !r.fires_triggers()));
    }

    #[test]
    fn test_status_change_snap_is_a_jump() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        passive.play();
        while passive.pop_evaluation().is_some() {}

        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(600),
            status: PlayerStatus::Paused,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        assert!(passive.is_paused());

        let mut requests = Vec::new();
        while let Some(request) = passive.pop_evaluation() {
            requests.push(request);
        }
        assert!(requests.iter().any(|r| r.has_jumped && r.range.to > FrameTime::ZERO));
        assert!(requests.iter().all(|r| !r.fires_triggers()));
    }

    #[test]
    fn test_passive_follows_pause_and_stop() {
        let clock = ManualClock::new();
        let mut authority = node(crate::NetRole::Authority, NetSyncConfig::default(), &clock);
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);

        authority.play();
        deliver(&mut authority, &mut passive);
        assert!(passive.is_playing());

        authority.update(1.0).unwrap();
        passive.update(1.0).unwrap();
        authority.pause();
        deliver(&mut authority, &mut passive);
        assert!(passive.is_paused());

        authority.stop();
        deliver(&mut authority, &mut passive);
        assert_eq!(passive.status(), PlayerStatus::Stopped);
        assert_eq!(passive.serial(), authority.serial());
        assert_eq!(passive.current_time().time, FrameTime::ZERO);
    }

    #[test]
    fn test_stop_event_catches_up_loops() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        passive.net.observed.status = PlayerStatus::Playing;
        passive.play();
        passive.update(23.0).unwrap();
        while passive.pop_evaluation().is_some() {}

        // The authority wrapped into the next loop before stopping
        passive.net.observed.loop_count = 1;
        passive.apply_event(ExplicitEvent::Stopped {
            time: FrameTime::from_frame(50),
            serial: SerialNumber(1),
        });

        assert_eq!(passive.status(), PlayerStatus::Stopped);
        assert_eq!(passive.current_time().time, FrameTime::from_frame(50));
        let last = std::iter::from_fn(|| passive.pop_evaluation()).last().unwrap();
        assert_eq!(last.status, PlayerStatus::Stopped);
        assert_eq!(passive.pop_notification(), Some(PlayerNotification::Played));
        assert_eq!(passive.pop_notification(), Some(PlayerNotification::Stopped));
    }

    #[test]
    fn test_drift_corrected_on_next_update() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::unsmoothed(), &clock);
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::ZERO,
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        assert!(passive.is_playing());

        // Authority is 5 hours ahead
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(500),
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        assert_eq!(passive.current_time().time, FrameTime::ZERO);

        passive.update(0.01).unwrap();
        assert_eq!(passive.current_time().time, FrameTime::from_frame(500));

        let requests: Vec<_> = std::iter::from_fn(|| passive.pop_evaluation()).collect();
        let correction = requests.last().unwrap();
        assert!(correction.has_jumped);
        assert_eq!(correction.suppress_triggers_until, None);
        assert!(!passive.skips_next_update());
    }

    #[test]
    fn test_backwards_correction_suppresses_retriggering() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::unsmoothed(), &clock);
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(1000),
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        assert_eq!(passive.current_time().time, FrameTime::from_frame(1000));

        // Authority reports an earlier position
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(800),
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        passive.update(0.01).unwrap();
        assert_eq!(passive.current_time().time, FrameTime::from_frame(800));
        while passive.pop_evaluation().is_some() {}

        // The next sweep (800..900) is still short of the old position
        passive.update(1.0).unwrap();
        let sweep = passive.pop_evaluation().unwrap();
        assert_eq!(
            sweep.suppress_triggers_until,
            Some(FrameTime::from_frame(600_000))
        );
    }

    #[test]
    fn test_small_drift_is_tolerated() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::unsmoothed(), &clock);
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::ZERO,
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_decimal(0.1),
            status: PlayerStatus::Playing,
            loop_count: 0,
            serial: SerialNumber::ZERO,
        });

        passive.update(0.0).unwrap();
        assert_eq!(passive.current_time().time, FrameTime::ZERO);
    }

    #[test]
    fn test_play_rate_event_discards_samples() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        passive.net.samples.add(1.0, 0.0);

        passive.apply_event(ExplicitEvent::PlayRateChanged {
            rate: 3.0,
            serial: SerialNumber(1),
        });
        assert_eq!(passive.server_sample_count(), 0);
        assert_eq!(passive.play_rate(), 3.0);
    }

    #[test]
    fn test_authority_ignores_snapshots() {
        let clock = ManualClock::new();
        let mut authority = node(crate::NetRole::Authority, NetSyncConfig::default(), &clock);
        authority.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(1000),
            status: PlayerStatus::Playing,
            loop_count: 3,
            serial: SerialNumber(9),
        });
        assert_eq!(authority.status(), PlayerStatus::Stopped);
        assert_eq!(authority.current_time().time, FrameTime::ZERO);
    }

    #[test]
    fn test_rewind_for_replay() {
        let clock = ManualClock::new();
        let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
        passive.apply_snapshot(NetworkSnapshot {
            position: FrameTime::from_frame(400),
            status: PlayerStatus::Playing,
            loop_count: 2,
            serial: SerialNumber::ZERO,
        });

        passive.rewind_for_replay();
        assert_eq!(passive.status(), PlayerStatus::Stopped);
        assert_eq!(passive.observed_snapshot(), NetworkSnapshot::default());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn event_strategy() -> impl Strategy<Value = ExplicitEvent> {
            (0u32..20, 0i64..2400, 0u8..4).prop_map(|(serial, frame, kind)| {
                let time = FrameTime::from_frame(frame);
                let serial = SerialNumber(serial);
                match kind {
                    0 => ExplicitEvent::PositionUpdate {
                        method: UpdatePositionMethod::Jump,
                        time,
                        serial,
                    },
                    1 => ExplicitEvent::PositionUpdate {
                        method: UpdatePositionMethod::Scrub,
                        time,
                        serial,
                    },
                    2 => ExplicitEvent::PlayRateChanged {
                        rate: 1.0 + frame as f32 / 1000.0,
                        serial,
                    },
                    _ => ExplicitEvent::Stopped { time, serial },
                }
            })
        }

        proptest! {
            #[test]
            fn replaying_applied_events_changes_nothing(
                events in proptest::collection::vec(event_strategy(), 1..30)
            ) {
                let clock = ManualClock::new();
                let mut passive = node(crate::NetRole::Passive, NetSyncConfig::default(), &clock);
                for event in &events {
                    passive.apply_event(*event);
                }

                let status = passive.status();
                let time = passive.current_time().time;
                let serial = passive.serial();
                let rate = passive.play_rate();

                for event in &events {
                    passive.apply_event(*event);
                }

                prop_assert_eq!(passive.status(), status);
                prop_assert_eq!(passive.current_time().time, time);
                prop_assert_eq!(passive.serial(), serial);
                prop_assert_eq!(passive.play_rate(), rate);
            }
        }
    }
}
