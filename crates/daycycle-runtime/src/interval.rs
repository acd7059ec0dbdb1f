//! Update interval gating
//!
//! A [`TickGate`] accumulates host time and releases it once the configured
//! interval has elapsed. While any [`OverrideIntervalHandle`] is alive the
//! (usually shorter) override interval applies instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

#[derive(Debug)]
pub struct TickGate {
    interval: f32,
    override_interval: f32,
    overrides: Arc<AtomicUsize>,
    accumulated: f32,
}

impl TickGate {
    pub fn new(interval: f32, override_interval: f32) -> Self {
        TickGate {
            interval: interval.max(0.0),
            override_interval: override_interval.max(0.0),
            overrides: Arc::new(AtomicUsize::new(0)),
            accumulated: 0.0,
        }
    }

    pub fn set_interval(&mut self, interval: f32) {
        self.interval = interval.max(0.0);
    }

    /// Force the override interval until the returned handle is dropped
    pub fn request_override(&self) -> OverrideIntervalHandle {
        let previous = self.overrides.fetch_add(1, Ordering::AcqRel);
        trace!("Update interval override requested ({} active)", previous + 1);
        OverrideIntervalHandle {
            overrides: self.overrides.clone(),
        }
    }

    #[inline]
    pub fn is_overridden(&self) -> bool {
        self.overrides.load(Ordering::Acquire) > 0
    }

    /// Interval currently in force, in seconds
    pub fn effective_interval(&self) -> f32 {
        if self.is_overridden() {
            self.override_interval
        } else {
            self.interval
        }
    }

    /// Add `delta` seconds; returns the accumulated time once the interval
    /// has elapsed
    pub fn accumulate(&mut self, delta: f32) -> Option<f32> {
        self.accumulated += delta;
        if self.accumulated >= self.effective_interval() {
            Some(std::mem::take(&mut self.accumulated))
        } else {
            None
        }
    }

    /// Hold `delta` seconds back without releasing anything
    pub fn defer(&mut self, delta: f32) {
        self.accumulated += delta;
    }

    /// Time held back so far
    pub fn pending(&self) -> f32 {
        self.accumulated
    }
}

/// Keeps the override interval in force while alive
#[derive(Debug)]
#[must_use = "the override ends when the handle is dropped"]
pub struct OverrideIntervalHandle {
    overrides: Arc<AtomicUsize>,
}

impl Drop for OverrideIntervalHandle {
    fn drop(&mut self) {
        self.overrides.fetch_sub(1, Ordering::AcqRel);
    }
}
