//! Time controllers - turn host ticks into candidate play positions

use daycycle_core::{FrameRate, FrameTime, QualifiedFrameTime};

/// Source of the position a playing player should move to
pub trait TimeController: Send {
    /// Playback started from `time`
    fn start_playing(&mut self, time: QualifiedFrameTime);

    /// Playback stopped or paused at `time`
    fn stop_playing(&mut self, time: QualifiedFrameTime);

    /// Host tick while playing; `delta_seconds` is already dilated
    fn tick(&mut self, delta_seconds: f32, play_rate: f32);

    /// Position was moved externally
    fn reset(&mut self, time: QualifiedFrameTime);

    /// Candidate position at `rate`, given the player's current time
    fn request_current_time(&self, current: QualifiedFrameTime, rate: FrameRate) -> FrameTime;
}

/// Default controller: accumulates scaled host delta time
#[derive(Clone, Debug)]
pub struct TickController {
    /// Anchor set on start/reset
    origin: Option<QualifiedFrameTime>,
    /// Seconds of sequence time elapsed since the anchor
    elapsed: f64,
}

impl TickController {
    pub fn new() -> Self {
        TickController {
            origin: None,
            elapsed: 0.0,
        }
    }

    /// Seconds accumulated since the last anchor
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed
    }
}

impl Default for TickController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeController for TickController {
    fn start_playing(&mut self, time: QualifiedFrameTime) {
        self.reset(time);
    }

    fn stop_playing(&mut self, time: QualifiedFrameTime) {
        self.reset(time);
    }

    fn tick(&mut self, delta_seconds: f32, play_rate: f32) {
        if delta_seconds.is_finite() && play_rate.is_finite() {
            self.elapsed += delta_seconds as f64 * play_rate as f64;
        }
    }

    fn reset(&mut self, time: QualifiedFrameTime) {
        self.origin = Some(time);
        self.elapsed = 0.0;
    }

    fn request_current_time(&self, current: QualifiedFrameTime, rate: FrameRate) -> FrameTime {
        let origin = self.origin.unwrap_or(current);
        let seconds = origin.as_seconds() + self.elapsed;
        rate.as_frame_time(seconds)
    }
}
