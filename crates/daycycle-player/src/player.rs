//! Playback engine
//!
//! A [`Player`] is a pure state machine over a timeline's frame range. It
//! never evaluates content itself: every position change is queued as an
//! [`EvaluationRequest`] that the host drains inside an [`EvaluationGuard`]
//! scope. Transitions the rest of the session must hear about are queued as
//! [`ExplicitEvent`]s, and lifecycle callbacks as [`PlayerNotification`]s.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, error, trace, warn};

use daycycle_core::{
    Clock, EvaluationRange, EvaluationRequest, FrameNumber, FrameRate, FrameTime, PlayDirection,
    PlayerStatus, QualifiedFrameTime, SerialNumber, SystemClock, UpdatePositionMethod,
    DEFAULT_DISPLAY_RATE, DEFAULT_TICK_RESOLUTION, MAX_SUB_FRAME,
};

use crate::replication::NetSync;
use crate::{
    EvaluationFlag, EvaluationGuard, ExplicitEvent, LatentAction, NetRole, NetSyncConfig,
    NetworkSnapshot, PlaybackPosition, PlaybackSettings, PlayerError, TickController,
    TimeController,
};

/// Smallest duration used when computing loop counts
const MIN_LOOP_DURATION: f64 = 1.0e-8;

/// Frame range and rates of the timeline a player drives
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineBounds {
    pub display_rate: FrameRate,
    pub tick_resolution: FrameRate,
    /// Inclusive start, in tick resolution
    pub start: FrameTime,
    /// Exclusive end, in tick resolution
    pub end: FrameTime,
}

/// Lifecycle callbacks queued for the host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerNotification {
    Played,
    Paused,
    Stopped,
    Finished,
}

/// Playback state machine for one timeline
pub struct Player {
    role: NetRole,
    status: PlayerStatus,
    settings: PlaybackSettings,
    position: PlaybackPosition,
    start_time: FrameNumber,
    duration_frames: i64,
    duration_sub_frames: f32,
    has_timeline: bool,
    current_loops: i32,
    serial: SerialNumber,
    controller: Box<dyn TimeController>,
    time_dilation: f32,
    warn_zero_duration: bool,
    skip_next_update: bool,
    /// Tick-resolution time up to which triggers stay silent
    suppress_triggers_until: Option<FrameTime>,
    evaluating: EvaluationFlag,
    latent_actions: VecDeque<LatentAction>,
    evaluations: VecDeque<EvaluationRequest>,
    outgoing: VecDeque<ExplicitEvent>,
    notifications: VecDeque<PlayerNotification>,
    pub(crate) net: NetSync,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Player {
    /// Create a player with default network settings and the system clock
    pub fn new(role: NetRole) -> Self {
        Self::with_config(role, NetSyncConfig::default(), Arc::new(SystemClock::new()))
    }

    /// Create a player with explicit network settings and wall clock
    pub fn with_config(role: NetRole, net_config: NetSyncConfig, clock: Arc<dyn Clock>) -> Self {
        Player {
            role,
            status: PlayerStatus::Stopped,
            settings: PlaybackSettings::default(),
            position: PlaybackPosition::default(),
            start_time: FrameNumber(0),
            duration_frames: 0,
            duration_sub_frames: 0.0,
            has_timeline: false,
            current_loops: 0,
            serial: SerialNumber::ZERO,
            controller: Box::new(TickController::new()),
            time_dilation: 1.0,
            warn_zero_duration: true,
            skip_next_update: false,
            suppress_triggers_until: None,
            evaluating: EvaluationFlag::new(),
            latent_actions: VecDeque::new(),
            evaluations: VecDeque::new(),
            outgoing: VecDeque::new(),
            notifications: VecDeque::new(),
            net: NetSync::new(net_config),
            clock,
        }
    }

    /// Assign a timeline and reset the play cursor to its start (plus the
    /// configured offset)
    pub fn initialize(
        &mut self,
        bounds: TimelineBounds,
        settings: PlaybackSettings,
    ) -> Result<(), PlayerError> {
        if self.evaluating.is_set() {
            error!("Cannot initialize a player while it is evaluating");
            return Err(PlayerError::ReentrantAdvance);
        }

        if self.has_timeline {
            self.stop_internal(self.position.current());
        }
        self.settings = settings;

        let mut tick_resolution = bounds.tick_resolution;
        if !tick_resolution.is_valid() {
            error!(
                "Invalid tick resolution {:?}, defaulting to {}",
                tick_resolution, DEFAULT_TICK_RESOLUTION
            );
            tick_resolution = DEFAULT_TICK_RESOLUTION;
        }
        let mut display_rate = bounds.display_rate;
        if !display_rate.is_valid() {
            error!(
                "Invalid display rate {:?}, defaulting to {}",
                display_rate, DEFAULT_DISPLAY_RATE
            );
            display_rate = DEFAULT_DISPLAY_RATE;
        }

        self.position.set_time_base(display_rate, tick_resolution);

        let start = FrameRate::transform_time(bounds.start, tick_resolution, display_rate);
        let end = FrameRate::transform_time(bounds.end, tick_resolution, display_rate);
        let starting_frame = start.floor_to_frame();
        let ending_frame = end.floor_to_frame();
        self.has_timeline = true;
        self.set_frame_range(
            starting_frame.value(),
            ending_frame.value() - starting_frame.value(),
            end.sub_frame(),
        );

        let offset = if self.settings.random_start && self.duration_frames > 0 {
            FrameTime::from_frame(rand::thread_rng().gen_range(0..self.duration_frames))
        } else {
            let specified = display_rate.as_frame_time(self.settings.start_offset as f64);
            let max = FrameTime::from_frame((self.duration_frames - 1).max(0));
            specified.clamp_to(FrameTime::ZERO, max)
        };

        self.latent_actions.clear();
        self.position.reset(FrameTime::from(self.start_time) + offset);
        self.controller.reset(self.current_time());
        self.net.observed.position = self.position.current();

        debug!(
            "Initialized player: display {}, ticks {}, start {}, duration {}",
            display_rate,
            tick_resolution,
            self.start_time.value(),
            self.duration_frames
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn play(&mut self) {
        if self.needs_latent_action() {
            self.latent_actions.push_back(LatentAction::Play);
            return;
        }
        self.play_internal();
    }

    pub fn play_looping(&mut self, loops: i32) {
        if self.needs_latent_action() {
            self.latent_actions.push_back(LatentAction::PlayLooping(loops));
            return;
        }
        self.settings.loop_count = loops;
        self.play_internal();
    }

    pub(crate) fn play_internal(&mut self) {
        if self.status == PlayerStatus::Playing || !self.has_timeline {
            return;
        }
        debug!("Play (current status: {})", self.status);

        self.status = PlayerStatus::Playing;

        let current = self.position.current();
        let rate = self.settings.play_rate;
        if current == self.last_valid_time() {
            if rate > 0.0 {
                self.move_position(self.start(), UpdatePositionMethod::Jump, false);
            }
        } else if current == self.start() && rate < 0.0 {
            self.move_position(self.last_valid_time(), UpdatePositionMethod::Jump, false);
        }

        self.controller.start_playing(self.current_time());

        let current = self.position.current();
        if self.position.last_play_eval() != Some(current) {
            let range = self.position.play_to(current);
            self.queue_evaluation(range, PlayerStatus::Playing, false);
        }

        self.notifications.push_back(PlayerNotification::Played);
    }

    /// Freeze at the current position; evaluated once more as stopped
    pub fn pause(&mut self) {
        if self.needs_latent_action() {
            self.latent_actions.push_back(LatentAction::Pause);
            return;
        }
        if self.status != PlayerStatus::Playing {
            return;
        }
        debug!("Pause at {}", self.position.current());

        self.status = PlayerStatus::Paused;
        self.controller.stop_playing(self.current_time());

        let range = self.position.current_as_range();
        self.queue_evaluation(range, PlayerStatus::Stopped, false);
        self.notifications.push_back(PlayerNotification::Paused);
    }

    pub fn scrub(&mut self) {
        self.status = PlayerStatus::Scrubbing;
        self.controller.stop_playing(self.current_time());
    }

    /// Enter scrubbing and move to `time`
    pub fn scrub_to(&mut self, time: FrameTime) {
        self.scrub();
        self.set_playback_position(time, UpdatePositionMethod::Scrub);
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self) {
        self.stop_internal(self.start());
    }

    pub fn stop_at_current_time(&mut self) {
        self.stop_internal(self.position.current());
    }

    pub(crate) fn stop_internal(&mut self, time: FrameTime) {
        if self.needs_latent_action() {
            self.latent_actions.push_back(LatentAction::Stop(time));
            return;
        }
        if self.status != PlayerStatus::Playing && self.status != PlayerStatus::Paused {
            return;
        }
        debug!("Stop at {} (current status: {})", time, self.status);

        self.status = PlayerStatus::Stopped;
        self.position.reset(time);
        self.controller.stop_playing(self.current_time());
        self.current_loops = 0;
        self.settings.loop_count = 0;

        let range = self.position.current_as_range();
        self.queue_evaluation(range, PlayerStatus::Stopped, false);

        if self.role.authors_serials() {
            self.serial = self.serial.next();
            if self.role.is_authority() {
                self.outgoing.push_back(ExplicitEvent::Stopped {
                    time,
                    serial: self.serial,
                });
            }
        }
        self.notifications.push_back(PlayerNotification::Stopped);
    }

    pub(crate) fn finish_playback(&mut self, time: FrameTime) {
        if self.settings.pause_at_end {
            self.pause();
        } else {
            self.stop_internal(time);
        }
        self.controller.stop_playing(self.current_time());
        self.notifications.push_back(PlayerNotification::Finished);
    }

    pub fn go_to_end_and_stop(&mut self) {
        let last_valid = self.last_valid_time();
        if self.position.current() == last_valid && self.status == PlayerStatus::Stopped {
            return;
        }

        self.status = PlayerStatus::Playing;
        self.set_playback_position(last_valid, UpdatePositionMethod::Jump);
        self.stop_internal(last_valid);
    }

    /// Move the play cursor. On the authority this is replicated as an
    /// explicit position update.
    pub fn set_playback_position(&mut self, time: FrameTime, method: UpdatePositionMethod) {
        self.set_playback_position_with(time, method, false);
    }

    pub fn set_playback_position_with(
        &mut self,
        time: FrameTime,
        method: UpdatePositionMethod,
        has_jumped: bool,
    ) {
        if !self.has_timeline {
            return;
        }
        if self.needs_latent_action() {
            self.latent_actions.push_back(LatentAction::SetPosition {
                time,
                method,
                has_jumped,
            });
            return;
        }

        self.move_position(time, method, has_jumped);

        if self.role.authors_serials() {
            self.serial = self.serial.next();
            if self.role.is_authority() {
                self.outgoing.push_back(ExplicitEvent::PositionUpdate {
                    method,
                    time,
                    serial: self.serial,
                });
            }
        }
    }

    /// Move without replication
    pub(crate) fn move_position(&mut self, time: FrameTime, method: UpdatePositionMethod, has_jumped: bool) {
        if let Err(err) = self.update_time_cursor(time, method, has_jumped) {
            trace!("Position update to {} skipped: {}", time, err);
        }
        self.controller.reset(self.current_time());
    }

    pub fn set_play_rate(&mut self, rate: f32) {
        self.settings.play_rate = rate;

        if self.role.authors_serials() {
            self.serial = self.serial.next();
            if self.role.is_authority() {
                self.outgoing.push_back(ExplicitEvent::PlayRateChanged {
                    rate,
                    serial: self.serial,
                });
            }
        }
    }

    /// Change the display rate, keeping the range's duration in seconds
    pub fn set_frame_rate(&mut self, rate: FrameRate) -> Result<(), PlayerError> {
        if !rate.is_valid() {
            error!("Attempting to set an invalid frame rate: {:?}", rate);
            return Err(PlayerError::InvalidFrameRate(rate));
        }

        let current_rate = self.position.input_rate();
        self.start_time =
            FrameRate::transform_time(FrameTime::from(self.start_time), current_rate, rate)
                .floor_to_frame();
        self.duration_frames =
            FrameRate::transform_time(FrameTime::from_frame(self.duration_frames), current_rate, rate)
                .round_to_frame()
                .value();
        self.position.set_time_base(rate, self.position.output_rate());
        Ok(())
    }

    /// Set the playable range in display frames
    pub fn set_frame_range(&mut self, start: i64, duration: i64, sub_frames: f32) {
        self.start_time = FrameNumber(start);
        self.duration_frames = duration.max(0);
        self.duration_sub_frames = sub_frames.clamp(0.0, MAX_SUB_FRAME);

        let current = self.position.current();
        let last_valid = self.last_valid_time();
        if current < self.start() {
            self.position.reset(self.start());
        } else if current > last_valid {
            self.position.reset(last_valid);
        }

        self.controller.reset(self.current_time());
    }

    // ------------------------------------------------------------------
    // Advancing
    // ------------------------------------------------------------------

    /// Advance by `delta_seconds` of host time
    pub fn update(&mut self, delta_seconds: f32) -> Result<(), PlayerError> {
        if self.evaluating.is_set() {
            error!("Re-entrant player update while an evaluation is in progress");
            return Err(PlayerError::ReentrantAdvance);
        }
        if !self.has_timeline {
            return Err(PlayerError::NoTimeline);
        }

        self.run_latent_actions();
        self.update_network_sync();

        let mut result = Ok(());
        if self.status == PlayerStatus::Playing {
            let play_rate = self.settings.play_rate;
            self.controller
                .tick(delta_seconds * self.time_dilation, play_rate);

            if !self.skip_next_update {
                let new_time = self
                    .controller
                    .request_current_time(self.current_time(), self.position.input_rate());
                trace!("Advance to {}", new_time);
                result = self.update_time_cursor(new_time, UpdatePositionMethod::Play, false);
            }
            self.skip_next_update = false;
        }
        result
    }

    fn update_time_cursor(
        &mut self,
        new_position: FrameTime,
        method: UpdatePositionMethod,
        has_jumped: bool,
    ) -> Result<(), PlayerError> {
        let status_override = method.evaluation_status();

        if self.duration_frames == 0 && self.duration_sub_frames == 0.0 {
            if self.warn_zero_duration {
                self.warn_zero_duration = false;
                warn!("Attempting to play back a timeline with zero duration");
            }
            return Err(PlayerError::ZeroDuration);
        }
        self.warn_zero_duration = true;

        if method == UpdatePositionMethod::Play && self.should_stop_or_loop(new_position) {
            let start = self.start();
            let last_valid = self.last_valid_time();
            let duration = self.duration().time.as_decimal().max(MIN_LOOP_DURATION);
            let relative = (new_position - start).as_decimal();
            let direction = if new_position < start {
                PlayDirection::Backwards
            } else {
                PlayDirection::Forwards
            };

            let times_looped = (relative / duration).floor().abs().min(i32::MAX as f64) as i32;
            let within_loops = self.settings.loops_forever()
                || self.current_loops.saturating_add(times_looped) <= self.settings.loop_count;

            if within_loops {
                self.current_loops = self.current_loops.saturating_add(times_looped);
                if times_looped > 0 {
                    self.net.samples.reset();
                }

                // Finish the current loop so anything at its tail still fires
                let current = self.position.current();
                match direction {
                    PlayDirection::Forwards if current < last_valid => {
                        let range = self.position.play_to(last_valid);
                        self.queue_evaluation(range, status_override, false);
                    }
                    PlayDirection::Backwards if current > start => {
                        let range = self.position.play_to(start);
                        self.queue_evaluation(range, status_override, false);
                    }
                    _ => {}
                }

                let mut overplay = relative.rem_euclid(duration);
                if overplay >= duration {
                    overplay = 0.0;
                }
                let wrapped = (start + FrameTime::from_decimal(overplay)).clamp_to(start, last_valid);
                let origin = match direction {
                    PlayDirection::Forwards => start,
                    PlayDirection::Backwards => last_valid,
                };

                self.position.reset(origin);
                let range = self.position.play_to(wrapped);
                self.queue_evaluation(range, status_override, true);
                self.controller
                    .reset(QualifiedFrameTime::new(wrapped, self.position.input_rate()));

                trace!(
                    "Looped {} time(s) to {} (loop {})",
                    times_looped,
                    wrapped,
                    self.current_loops
                );
            } else {
                let clamped = new_position.clamp_to(start, last_valid);
                let range = self.update_play_position(clamped, method);
                self.queue_evaluation(range, status_override, has_jumped);

                if self.has_authority_to_finish() {
                    debug!("Finishing playback at {}", clamped);
                    self.finish_playback(clamped);

                    if self.role.authors_serials() {
                        self.serial = self.serial.next();
                        if self.role.is_authority() {
                            self.outgoing.push_back(ExplicitEvent::Finished {
                                time: clamped,
                                serial: self.serial,
                            });
                        }
                    }
                } else {
                    trace!("Holding at {} until the authority finishes", clamped);
                }
            }
        } else {
            let range = self.update_play_position(new_position, method);
            self.queue_evaluation(range, status_override, has_jumped);
        }

        Ok(())
    }

    fn update_play_position(&mut self, time: FrameTime, method: UpdatePositionMethod) -> EvaluationRange {
        match method {
            UpdatePositionMethod::Play => self.position.play_to(time),
            UpdatePositionMethod::Jump | UpdatePositionMethod::Scrub => self.position.jump_to(time),
        }
    }

    fn should_stop_or_loop(&self, new_position: FrameTime) -> bool {
        self.status == PlayerStatus::Playing
            && (new_position >= self.end() || new_position < self.start())
    }

    /// Standalone players and the authority always finish; passive players
    /// only when the authority is known to be stopped
    fn has_authority_to_finish(&self) -> bool {
        !self.role.is_passive() || self.net.observed.status == PlayerStatus::Stopped
    }

    fn queue_evaluation(&mut self, range: EvaluationRange, status: PlayerStatus, has_jumped: bool) {
        let suppress = self.suppress_triggers_until;
        if let Some(until) = suppress {
            let passed = match range.direction {
                PlayDirection::Forwards => range.to > until,
                PlayDirection::Backwards => range.to < until,
            };
            if passed {
                self.suppress_triggers_until = None;
            }
        }

        self.evaluations.push_back(EvaluationRequest {
            range,
            status,
            has_jumped,
            suppress_triggers_until: suppress,
        });
    }

    // ------------------------------------------------------------------
    // Evaluation scope and latent actions
    // ------------------------------------------------------------------

    /// Enter an evaluation scope; the player refuses to advance until the
    /// guard is dropped
    pub fn begin_evaluation(&self) -> Result<EvaluationGuard, PlayerError> {
        self.evaluating.acquire()
    }

    #[inline]
    pub fn is_evaluating(&self) -> bool {
        self.evaluating.is_set()
    }

    #[inline]
    fn needs_latent_action(&self) -> bool {
        self.evaluating.is_set()
    }

    pub(crate) fn queue_latent_action(&mut self, action: LatentAction) {
        self.latent_actions.push_back(action);
    }

    pub fn pending_latent_actions(&self) -> usize {
        self.latent_actions.len()
    }

    /// Replay operations deferred during evaluation
    pub fn run_latent_actions(&mut self) {
        if self.evaluating.is_set() {
            return;
        }
        while let Some(action) = self.latent_actions.pop_front() {
            trace!("Running latent action {:?}", action);
            match action {
                LatentAction::Play => self.play(),
                LatentAction::PlayLooping(loops) => self.play_looping(loops),
                LatentAction::Pause => self.pause(),
                LatentAction::Stop(time) => self.stop_internal(time),
                LatentAction::SetPosition {
                    time,
                    method,
                    has_jumped,
                } => self.set_playback_position_with(time, method, has_jumped),
                LatentAction::ApplySnapshot(snapshot) => self.apply_snapshot(snapshot),
                LatentAction::ApplyEvent(event) => self.apply_event(event),
            }
        }
    }

    pub fn pop_evaluation(&mut self) -> Option<EvaluationRequest> {
        self.evaluations.pop_front()
    }

    pub fn has_pending_evaluations(&self) -> bool {
        !self.evaluations.is_empty()
    }

    pub fn pop_outgoing(&mut self) -> Option<ExplicitEvent> {
        self.outgoing.pop_front()
    }

    pub fn pop_notification(&mut self) -> Option<PlayerNotification> {
        self.notifications.pop_front()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlayerStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.status == PlayerStatus::Paused
    }

    pub fn has_timeline(&self) -> bool {
        self.has_timeline
    }

    pub fn serial(&self) -> SerialNumber {
        self.serial
    }

    pub(crate) fn set_serial(&mut self, serial: SerialNumber) {
        self.serial = serial;
    }

    pub fn current_loops(&self) -> i32 {
        self.current_loops
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn play_rate(&self) -> f32 {
        self.settings.play_rate
    }

    pub(crate) fn set_play_rate_local(&mut self, rate: f32) {
        self.settings.play_rate = rate;
    }

    pub fn time_dilation(&self) -> f32 {
        self.time_dilation
    }

    /// World time dilation applied on top of the play rate
    pub fn set_time_dilation(&mut self, dilation: f32) {
        self.time_dilation = if dilation.is_finite() { dilation.max(0.0) } else { 1.0 };
    }

    pub fn set_time_controller(&mut self, mut controller: Box<dyn TimeController>) {
        controller.reset(self.current_time());
        self.controller = controller;
    }

    /// Current position at the display rate
    pub fn current_time(&self) -> QualifiedFrameTime {
        QualifiedFrameTime::new(self.position.current(), self.position.input_rate())
    }

    pub fn duration(&self) -> QualifiedFrameTime {
        QualifiedFrameTime::new(
            FrameTime::new(FrameNumber(self.duration_frames), self.duration_sub_frames),
            self.position.input_rate(),
        )
    }

    pub fn frame_duration(&self) -> i64 {
        self.duration_frames
    }

    pub fn display_rate(&self) -> FrameRate {
        self.position.input_rate()
    }

    pub fn tick_resolution(&self) -> FrameRate {
        self.position.output_rate()
    }

    pub fn start(&self) -> FrameTime {
        FrameTime::from(self.start_time)
    }

    /// Exclusive end of the range
    pub fn end(&self) -> FrameTime {
        FrameTime::new(self.start_time + self.duration_frames, self.duration_sub_frames)
    }

    /// Largest position still inside the range
    pub fn last_valid_time(&self) -> FrameTime {
        if self.duration_frames > 0 {
            if self.duration_sub_frames > 0.0 {
                FrameTime::new(self.start_time + self.duration_frames, self.duration_sub_frames)
            } else {
                FrameTime::new(self.start_time + (self.duration_frames - 1), MAX_SUB_FRAME)
            }
        } else {
            self.start()
        }
    }

    pub fn skips_next_update(&self) -> bool {
        self.skip_next_update
    }

    pub(crate) fn request_skip_next_update(&mut self) {
        self.skip_next_update = true;
    }

    pub(crate) fn suppress_triggers_through(&mut self, time: FrameTime) {
        self.suppress_triggers_until = Some(time);
    }

    pub(crate) fn position(&self) -> &PlaybackPosition {
        &self.position
    }

    pub(crate) fn reset_position(&mut self, time: FrameTime) {
        self.position.reset(time);
        self.controller.reset(self.current_time());
    }

    /// State published to passive players
    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            position: self.position.current(),
            status: self.status,
            loop_count: self.current_loops,
            serial: self.serial,
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("role", &self.role)
            .field("status", &self.status)
            .field("position", &self.position.current())
            .field("loops", &self.current_loops)
            .field("serial", &self.serial)
            .finish()
    }
}
