//! Frame-based time primitives
//!
//! Playback positions are rational: an integer frame count plus a sub-frame
//! fraction, interpreted at a [`FrameRate`]. Every timeline carries two rates:
//! - display rate: coarse, the rate play positions are expressed in
//! - tick resolution: fine, the rate evaluation ranges are expressed in
//!
//! The root day timeline maps one sequence second to one hour of day.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Largest representable sub-frame strictly below 1.0
pub const MAX_SUB_FRAME: f32 = 0.999_999_94;

/// Display frames per root-timeline second (one second == one hour of day)
pub const ROOT_FRAMES_PER_HOUR: i32 = 100;

/// Upper bound on configurable day length
pub const MAX_DAY_LENGTH_HOURS: f32 = 1000.0;

/// Tick resolution used when a timeline reports an invalid one
pub const DEFAULT_TICK_RESOLUTION: FrameRate = FrameRate::new(60_000, 1);

/// Display rate used when a timeline reports an invalid one
pub const DEFAULT_DISPLAY_RATE: FrameRate = FrameRate::new(30, 1);

/// Display rate of the composed root timeline
pub const ROOT_DISPLAY_RATE: FrameRate = FrameRate::new(ROOT_FRAMES_PER_HOUR, 1);

/// Rational frame rate (frames per second = numerator / denominator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: i32,
    pub denominator: i32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        FrameRate {
            numerator,
            denominator,
        }
    }

    /// A rate is usable only when both terms are strictly positive
    #[inline]
    pub fn is_valid(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Frames per second as a decimal
    #[inline]
    pub fn as_decimal(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Seconds per frame
    #[inline]
    pub fn as_interval(self) -> f64 {
        self.denominator as f64 / self.numerator as f64
    }

    /// Convert a frame time at this rate to seconds
    #[inline]
    pub fn as_seconds(self, time: FrameTime) -> f64 {
        time.as_decimal() * self.denominator as f64 / self.numerator as f64
    }

    /// Convert seconds to a frame time at this rate
    #[inline]
    pub fn as_frame_time(self, seconds: f64) -> FrameTime {
        FrameTime::from_decimal(seconds * self.numerator as f64 / self.denominator as f64)
    }

    /// Whether `other` divides evenly into this rate
    pub fn is_multiple_of(self, other: FrameRate) -> bool {
        let lhs = self.numerator as i64 * other.denominator as i64;
        let rhs = other.numerator as i64 * self.denominator as i64;
        rhs != 0 && lhs % rhs == 0
    }

    /// Exact rational rescale of `time` from one rate to another.
    ///
    /// The integer part is rescaled with 128-bit arithmetic so large tick
    /// counts keep their precision; only the remainder goes through floats.
    pub fn transform_time(time: FrameTime, from: FrameRate, to: FrameRate) -> FrameTime {
        if from == to {
            return time;
        }

        let num = to.numerator as i128 * from.denominator as i128;
        let den = to.denominator as i128 * from.numerator as i128;
        if den == 0 {
            return time;
        }

        let scaled = time.frame.0 as i128 * num;
        let whole = scaled.div_euclid(den);
        let rem = scaled.rem_euclid(den);
        let fractional = rem as f64 / den as f64 + time.sub_frame as f64 * num as f64 / den as f64;

        FrameTime::from_parts(whole as i64, fractional)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        DEFAULT_DISPLAY_RATE
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{} fps", self.numerator)
        } else {
            write!(f, "{:.3} fps", self.as_decimal())
        }
    }
}

/// Whole frame (or tick) count
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameNumber(pub i64);

impl FrameNumber {
    #[inline]
    pub const fn new(value: i64) -> Self {
        FrameNumber(value)
    }

    #[inline]
    pub fn value(self) -> i64 {
        self.0
    }
}

impl Add<i64> for FrameNumber {
    type Output = FrameNumber;

    #[inline]
    fn add(self, rhs: i64) -> Self::Output {
        FrameNumber(self.0 + rhs)
    }
}

impl Sub<i64> for FrameNumber {
    type Output = FrameNumber;

    #[inline]
    fn sub(self, rhs: i64) -> Self::Output {
        FrameNumber(self.0 - rhs)
    }
}

impl From<FrameNumber> for FrameTime {
    fn from(frame: FrameNumber) -> Self {
        FrameTime::from_frame(frame.0)
    }
}

/// Frame count plus a sub-frame fraction in `[0, 1)`
#[derive(Clone, Copy, Default)]
pub struct FrameTime {
    pub frame: FrameNumber,
    sub_frame: f32,
}

impl FrameTime {
    pub const ZERO: FrameTime = FrameTime {
        frame: FrameNumber(0),
        sub_frame: 0.0,
    };

    /// Build from a frame and sub-frame; out-of-range sub-frames are clamped
    #[inline]
    pub fn new(frame: FrameNumber, sub_frame: f32) -> Self {
        let sub_frame = if sub_frame.is_finite() {
            sub_frame.clamp(0.0, MAX_SUB_FRAME)
        } else {
            0.0
        };
        FrameTime { frame, sub_frame }
    }

    #[inline]
    pub fn from_frame(frame: i64) -> Self {
        FrameTime {
            frame: FrameNumber(frame),
            sub_frame: 0.0,
        }
    }

    /// Floor-based decomposition: negative values keep `sub_frame >= 0`
    pub fn from_decimal(value: f64) -> Self {
        if !value.is_finite() {
            return FrameTime::ZERO;
        }
        let floor = value.floor();
        FrameTime::from_parts(floor as i64, value - floor)
    }

    /// Normalise `frame + extra` where `extra` may be any finite value
    fn from_parts(frame: i64, extra: f64) -> Self {
        let carry = extra.floor();
        let mut frame = frame + carry as i64;
        let mut sub = (extra - carry) as f32;
        if sub >= 1.0 {
            frame += 1;
            sub = 0.0;
        }
        FrameTime {
            frame: FrameNumber(frame),
            sub_frame: sub.max(0.0),
        }
    }

    #[inline]
    pub fn sub_frame(self) -> f32 {
        self.sub_frame
    }

    #[inline]
    pub fn as_decimal(self) -> f64 {
        self.frame.0 as f64 + self.sub_frame as f64
    }

    #[inline]
    pub fn floor_to_frame(self) -> FrameNumber {
        self.frame
    }

    #[inline]
    pub fn round_to_frame(self) -> FrameNumber {
        if self.sub_frame >= 0.5 {
            self.frame + 1
        } else {
            self.frame
        }
    }

    #[inline]
    pub fn abs(self) -> Self {
        if self < FrameTime::ZERO {
            -self
        } else {
            self
        }
    }

    /// Clamp into `[min, max]`
    #[inline]
    pub fn clamp_to(self, min: FrameTime, max: FrameTime) -> Self {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }
}

impl PartialEq for FrameTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

// sub_frame is always finite, so total_cmp gives a lawful total order
impl Eq for FrameTime {}

impl PartialOrd for FrameTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frame
            .cmp(&other.frame)
            .then_with(|| self.sub_frame.total_cmp(&other.sub_frame))
    }
}

impl Add for FrameTime {
    type Output = FrameTime;

    fn add(self, rhs: FrameTime) -> Self::Output {
        FrameTime::from_parts(
            self.frame.0 + rhs.frame.0,
            self.sub_frame as f64 + rhs.sub_frame as f64,
        )
    }
}

impl AddAssign for FrameTime {
    fn add_assign(&mut self, rhs: FrameTime) {
        *self = *self + rhs;
    }
}

impl Sub for FrameTime {
    type Output = FrameTime;

    fn sub(self, rhs: FrameTime) -> Self::Output {
        FrameTime::from_parts(
            self.frame.0 - rhs.frame.0,
            self.sub_frame as f64 - rhs.sub_frame as f64,
        )
    }
}

impl SubAssign for FrameTime {
    fn sub_assign(&mut self, rhs: FrameTime) {
        *self = *self - rhs;
    }
}

impl Neg for FrameTime {
    type Output = FrameTime;

    fn neg(self) -> Self::Output {
        FrameTime::from_parts(-self.frame.0, -(self.sub_frame as f64))
    }
}

impl Mul<f64> for FrameTime {
    type Output = FrameTime;

    fn mul(self, rhs: f64) -> Self::Output {
        FrameTime::from_decimal(self.as_decimal() * rhs)
    }
}

impl fmt::Debug for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}+{:.4})", self.frame.0, self.sub_frame)
    }
}

impl fmt::Display for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.as_decimal())
    }
}

/// A frame time together with the rate it is expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualifiedFrameTime {
    pub time: FrameTime,
    pub rate: FrameRate,
}

impl QualifiedFrameTime {
    #[inline]
    pub fn new(time: FrameTime, rate: FrameRate) -> Self {
        QualifiedFrameTime { time, rate }
    }

    #[inline]
    pub fn as_seconds(&self) -> f64 {
        self.rate.as_seconds(self.time)
    }

    #[inline]
    pub fn convert_to(&self, rate: FrameRate) -> FrameTime {
        FrameRate::transform_time(self.time, self.rate, rate)
    }
}

/// Hours of day to a root-timeline frame time (one second per hour)
#[inline]
pub fn hours_to_frame_time(hours: f32, rate: FrameRate) -> FrameTime {
    rate.as_frame_time(hours as f64)
}

/// Root-timeline frame time to hours of day
#[inline]
pub fn frame_time_to_hours(time: FrameTime, rate: FrameRate) -> f32 {
    rate.as_seconds(time) as f32
}

/// Root duration in display frames for a configured day length
pub fn root_duration_frames(day_length_hours: f32) -> i64 {
    let hours = if day_length_hours.is_finite() {
        day_length_hours.clamp(0.0, MAX_DAY_LENGTH_HOURS)
    } else {
        0.0
    };
    (hours as f64 * ROOT_FRAMES_PER_HOUR as f64).round() as i64
}
