//! Static-time contributors
//!
//! A contributor asks for the apparent time of day to be held at a fixed
//! hour, with a blend weight in `[0, 1]`. Camera volumes, cutscenes and the
//! like implement [`StaticTimeContributor`]; hosts that just want to push
//! values use [`StaticTimeRequest`].

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use daycycle_core::{ContributorId, OwnerId};

pub trait StaticTimeContributor: Send + Sync {
    /// Whether this contributor currently wants the time held
    fn wants_static_time(&self) -> bool;

    /// `(blend_weight, hours)`
    fn static_time(&self) -> (f32, f32);
}

/// Contributor whose request is set from outside
#[derive(Debug)]
pub struct StaticTimeRequest {
    enabled: AtomicBool,
    value: Mutex<(f32, f32)>,
}

impl StaticTimeRequest {
    pub fn new(weight: f32, hours: f32) -> Self {
        StaticTimeRequest {
            enabled: AtomicBool::new(true),
            value: Mutex::new((weight, hours)),
        }
    }

    pub fn set(&self, weight: f32, hours: f32) {
        *self.value.lock() = (weight, hours);
    }

    pub fn set_weight(&self, weight: f32) {
        self.value.lock().0 = weight;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl StaticTimeContributor for StaticTimeRequest {
    fn wants_static_time(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn static_time(&self) -> (f32, f32) {
        *self.value.lock()
    }
}

/// Registration record held by the blender
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContributorInfo {
    pub id: ContributorId,
    pub owner: OwnerId,
    pub priority: i32,
}
