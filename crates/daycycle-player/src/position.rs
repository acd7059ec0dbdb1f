//! Play cursor
//!
//! Positions are held at the display rate; evaluation ranges come out at the
//! tick resolution.

use daycycle_core::{
    EvaluationRange, FrameRate, FrameTime, DEFAULT_DISPLAY_RATE, DEFAULT_TICK_RESOLUTION,
};

/// Current position of a player plus the last position evaluated by a sweep
#[derive(Clone, Debug)]
pub struct PlaybackPosition {
    input_rate: FrameRate,
    output_rate: FrameRate,
    current: FrameTime,
    previous_play_eval: Option<FrameTime>,
}

impl PlaybackPosition {
    pub fn new(input_rate: FrameRate, output_rate: FrameRate) -> Self {
        PlaybackPosition {
            input_rate,
            output_rate,
            current: FrameTime::ZERO,
            previous_play_eval: None,
        }
    }

    /// Change the rates; the current position is carried over to the new
    /// input rate
    pub fn set_time_base(&mut self, input_rate: FrameRate, output_rate: FrameRate) {
        if input_rate != self.input_rate {
            self.current = FrameRate::transform_time(self.current, self.input_rate, input_rate);
            self.previous_play_eval = self
                .previous_play_eval
                .map(|t| FrameRate::transform_time(t, self.input_rate, input_rate));
        }
        self.input_rate = input_rate;
        self.output_rate = output_rate;
    }

    #[inline]
    pub fn input_rate(&self) -> FrameRate {
        self.input_rate
    }

    #[inline]
    pub fn output_rate(&self) -> FrameRate {
        self.output_rate
    }

    #[inline]
    pub fn current(&self) -> FrameTime {
        self.current
    }

    #[inline]
    pub fn last_play_eval(&self) -> Option<FrameTime> {
        self.previous_play_eval
    }

    /// Move without evaluating; the next sweep starts here
    pub fn reset(&mut self, time: FrameTime) {
        self.current = time;
        self.previous_play_eval = None;
    }

    /// Sweep from the last evaluated position to `time`
    pub fn play_to(&mut self, time: FrameTime) -> EvaluationRange {
        let from = self.previous_play_eval.unwrap_or(self.current);
        self.current = time;
        self.previous_play_eval = Some(time);
        EvaluationRange::sweep(self.to_output(from), self.to_output(time), self.output_rate)
    }

    /// Teleport to `time`
    pub fn jump_to(&mut self, time: FrameTime) -> EvaluationRange {
        self.current = time;
        self.previous_play_eval = None;
        EvaluationRange::point(self.to_output(time), self.output_rate)
    }

    /// Point range at the current position
    pub fn current_as_range(&self) -> EvaluationRange {
        EvaluationRange::point(self.to_output(self.current), self.output_rate)
    }

    /// Convert a display-rate time to the tick resolution
    #[inline]
    pub fn to_output(&self, time: FrameTime) -> FrameTime {
        FrameRate::transform_time(time, self.input_rate, self.output_rate)
    }
}

impl Default for PlaybackPosition {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_RATE, DEFAULT_TICK_RESOLUTION)
    }
}
