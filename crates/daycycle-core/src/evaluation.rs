//! Evaluation requests handed from a player to whatever evaluates content

use crate::{FrameRate, FrameTime, PlayDirection, PlayerStatus};

/// Range of a timeline to evaluate, in tick resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluationRange {
    /// Previous position (inclusive of nothing when jumping)
    pub from: FrameTime,
    /// Position being evaluated
    pub to: FrameTime,
    pub rate: FrameRate,
    pub direction: PlayDirection,
}

impl EvaluationRange {
    /// Sweep from `from` to `to`
    pub fn sweep(from: FrameTime, to: FrameTime, rate: FrameRate) -> Self {
        let direction = if to < from {
            PlayDirection::Backwards
        } else {
            PlayDirection::Forwards
        };
        EvaluationRange {
            from,
            to,
            rate,
            direction,
        }
    }

    /// Single point, nothing in between is touched
    pub fn point(time: FrameTime, rate: FrameRate) -> Self {
        EvaluationRange {
            from: time,
            to: time,
            rate,
            direction: PlayDirection::Forwards,
        }
    }

    #[inline]
    pub fn is_point(&self) -> bool {
        self.from == self.to
    }

    /// Lower and upper bound regardless of direction
    pub fn bounds(&self) -> (FrameTime, FrameTime) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }

    /// Whether `time` lies in the half-open swept interval `(from, to]`
    /// (or `[to, from)` when travelling backwards)
    pub fn sweeps(&self, time: FrameTime) -> bool {
        match self.direction {
            PlayDirection::Forwards => time > self.from && time <= self.to,
            PlayDirection::Backwards => time >= self.to && time < self.from,
        }
    }
}

/// One queued evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationRequest {
    pub range: EvaluationRange,
    pub status: PlayerStatus,
    /// Position was reached discontinuously; triggers must not fire
    pub has_jumped: bool,
    /// Triggers at or before this tick-resolution time stay silent
    pub suppress_triggers_until: Option<FrameTime>,
}

impl EvaluationRequest {
    /// Whether triggers in the swept range may fire
    pub fn fires_triggers(&self) -> bool {
        self.status == PlayerStatus::Playing && !self.has_jumped && !self.range.is_point()
    }

    /// Whether a trigger at `time` is suppressed by a reconciliation jump
    pub fn is_suppressed(&self, time: FrameTime) -> bool {
        match self.suppress_triggers_until {
            Some(until) => match self.range.direction {
                PlayDirection::Forwards => time <= until,
                PlayDirection::Backwards => time >= until,
            },
            None => false,
        }
    }
}
