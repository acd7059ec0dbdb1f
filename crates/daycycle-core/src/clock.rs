//! Wall clocks
//!
//! Server-time samples are stamped with local wall time. Hosts inject a
//! [`Clock`] so simulations can drive time by hand.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Monotonic wall-clock source, in seconds
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> f64;
}

/// Real time measured from construction
#[derive(Debug, Clone)]
pub struct SystemClock {
    reference: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            reference: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_seconds(&self) -> f64 {
        self.reference.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(seconds: f64) -> Self {
        ManualClock {
            now: Arc::new(Mutex::new(seconds)),
        }
    }

    /// Move time forward; negative steps are ignored
    pub fn advance(&self, seconds: f64) {
        if seconds > 0.0 {
            *self.now.lock() += seconds;
        }
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock() = seconds;
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        *self.now.lock()
    }
}
