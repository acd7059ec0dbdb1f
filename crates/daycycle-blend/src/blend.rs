//! Static-time blending
//!
//! Active contributors are grouped by priority (highest first), averaged
//! within a group and composited front to back with alpha-over. The result
//! is blended against the naturally advancing time along the shortest way
//! round the clock, tracking wraparounds so the output never pops while
//! the natural time crosses midnight or the far side of the target.
//!
//! Dwelling partially blended for more than one full day produces a single
//! discontinuity of up to half a day when the natural time passes the
//! target again.

use std::sync::Arc;

use tracing::{debug, trace};

use daycycle_core::{ContributorId, OwnerId};

use crate::{ContributorInfo, StaticTimeContributor};

/// Wraparound tracking carried between evaluations
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlendState {
    last_delta: Option<f32>,
    last_direction: Option<i8>,
    winding_count: i32,
    offset_band: i32,
}

impl BlendState {
    pub fn reset(&mut self) {
        *self = BlendState::default();
    }

    pub fn is_empty(&self) -> bool {
        self.last_delta.is_none()
    }

    pub fn last_delta(&self) -> Option<f32> {
        self.last_delta
    }

    pub fn winding_count(&self) -> i32 {
        self.winding_count
    }

    /// Whole days added to the natural side of the blend, in `{-1, 0, 1}`
    pub fn offset_band(&self) -> i32 {
        self.offset_band
    }

    /// Record `delta` and update the band
    fn track(&mut self, delta: f32, half_day: f32) {
        let direction: i8 = if delta >= 0.0 { 1 } else { -1 };

        if let (Some(last_delta), Some(last_direction)) = (self.last_delta, self.last_direction) {
            // Passing through the target itself leaves the band alone; only
            // the far side of the target moves it
            if direction != last_direction && (delta - last_delta).abs() > half_day {
                self.offset_band = wrap_band(self.offset_band + last_direction as i32);
                self.winding_count += last_direction as i32;
                trace!(
                    "Static time wraparound, band {} winding {}",
                    self.offset_band,
                    self.winding_count
                );
            }
        }

        self.last_delta = Some(delta);
        self.last_direction = Some(direction);
    }
}

fn wrap_band(band: i32) -> i32 {
    (band + 1).rem_euclid(3) - 1
}

/// Weighted request from all active contributors
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticTimeTarget {
    /// Composited weight in `[0, 1]`
    pub weight: f32,
    /// Target hours
    pub time: f32,
}

struct Registered {
    info: ContributorInfo,
    contributor: Arc<dyn StaticTimeContributor>,
}

/// Blends contributors' static times over the natural time of day
pub struct StaticTimeBlender {
    day_length: f32,
    contributors: Vec<Registered>,
    next_id: u64,
    state: BlendState,
}

impl StaticTimeBlender {
    pub fn new(day_length_hours: f32) -> Self {
        StaticTimeBlender {
            day_length: sanitize_day_length(day_length_hours),
            contributors: Vec::new(),
            next_id: 1,
            state: BlendState::default(),
        }
    }

    pub fn day_length(&self) -> f32 {
        self.day_length
    }

    pub fn set_day_length(&mut self, hours: f32) {
        let hours = sanitize_day_length(hours);
        if hours != self.day_length {
            self.day_length = hours;
            self.state.reset();
        }
    }

    pub fn register(
        &mut self,
        owner: OwnerId,
        priority: i32,
        contributor: Arc<dyn StaticTimeContributor>,
    ) -> ContributorId {
        let id = ContributorId(self.next_id);
        self.next_id += 1;
        self.contributors.push(Registered {
            info: ContributorInfo {
                id,
                owner,
                priority,
            },
            contributor,
        });
        debug!("Registered static time contributor {:?} (priority {})", id, priority);
        id
    }

    pub fn unregister(&mut self, id: ContributorId) -> bool {
        let before = self.contributors.len();
        self.contributors.retain(|c| c.info.id != id);
        before != self.contributors.len()
    }

    /// Remove every contributor registered by `owner`
    pub fn unregister_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.contributors.len();
        self.contributors.retain(|c| c.info.owner != owner);
        before - self.contributors.len()
    }

    pub fn contributors(&self) -> impl Iterator<Item = &ContributorInfo> {
        self.contributors.iter().map(|c| &c.info)
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn state(&self) -> &BlendState {
        &self.state
    }

    /// Whether any contributor currently wants static time
    pub fn is_active(&self) -> bool {
        self.contributors
            .iter()
            .any(|c| c.contributor.wants_static_time())
    }

    /// Composite active contributors, or `None` when nobody contributes
    pub fn target(&self) -> Option<StaticTimeTarget> {
        let mut active: Vec<(i32, f32, f32)> = self
            .contributors
            .iter()
            .filter(|c| c.contributor.wants_static_time())
            .map(|c| {
                let (weight, time) = c.contributor.static_time();
                (c.info.priority, sanitize_weight(weight), time)
            })
            .collect();
        if active.is_empty() {
            return None;
        }
        active.sort_by(|a, b| b.0.cmp(&a.0));

        let mut accum_weight = 0.0f32;
        let mut accum_time = 0.0f32;
        let mut rest = active.as_slice();
        while let Some(first) = rest.first() {
            let len = rest.iter().position(|c| c.0 != first.0).unwrap_or(rest.len());
            let (group, tail) = rest.split_at(len);
            rest = tail;

            let count = group.len() as f32;
            let group_weight = group.iter().map(|c| c.1).sum::<f32>() / count;
            let group_time = group.iter().map(|c| c.2).sum::<f32>() / count;

            let remaining = 1.0 - accum_weight;
            accum_weight += remaining * group_weight;
            accum_time += remaining * group_weight * group_time;
        }

        if accum_weight <= 0.0 {
            return None;
        }
        Some(StaticTimeTarget {
            weight: accum_weight.min(1.0),
            time: accum_time / accum_weight,
        })
    }

    /// Apparent time of day given the natural `initial_time` (hours)
    pub fn apparent_time(&mut self, initial_time: f32) -> f32 {
        let Some(target) = self.target() else {
            if !self.state.is_empty() {
                trace!("No static time requested, resetting blend state");
            }
            self.state.reset();
            return initial_time;
        };
        if self.day_length <= 0.0 {
            return initial_time;
        }
        Self::blend(&mut self.state, self.day_length, initial_time, target)
    }

    /// Blend `initial_time` toward `target`, updating `state`
    pub fn blend(
        state: &mut BlendState,
        day_length: f32,
        initial_time: f32,
        target: StaticTimeTarget,
    ) -> f32 {
        let half_day = day_length * 0.5;
        let delta = shortest_delta(target.time, initial_time, day_length);
        state.track(delta, half_day);

        let natural = target.time + delta + state.offset_band as f32 * day_length;
        let blended = natural + (target.time - natural) * target.weight;
        blended.rem_euclid(day_length)
    }
}

impl std::fmt::Debug for StaticTimeBlender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTimeBlender")
            .field("day_length", &self.day_length)
            .field("contributors", &self.contributors.len())
            .field("state", &self.state)
            .finish()
    }
}

/// Signed delta from `from` to `to` around a clock of `day_length`, in
/// `[-day/2, day/2)`
pub fn shortest_delta(from: f32, to: f32, day_length: f32) -> f32 {
    let half_day = day_length * 0.5;
    (to - from + half_day).rem_euclid(day_length) - half_day
}

fn sanitize_day_length(hours: f32) -> f32 {
    if hours.is_finite() && hours > 0.0 {
        hours
    } else {
        0.0
    }
}

fn sanitize_weight(weight: f32) -> f32 {
    if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticTimeRequest;

    fn blender() -> StaticTimeBlender {
        StaticTimeBlender::new(24.0)
    }

    fn near(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_no_contributors_passes_natural_time() {
        let mut blender = blender();
        assert_eq!(blender.apparent_time(13.5), 13.5);
        assert!(blender.state().is_empty());
    }

    #[test]
    fn test_higher_priority_wins() {
        let mut blender = blender();
        blender.register(OwnerId(1), 10, Arc::new(StaticTimeRequest::new(1.0, 6.0)));
        blender.register(OwnerId(2), 5, Arc::new(StaticTimeRequest::new(1.0, 18.0)));

        assert!(near(blender.apparent_time(12.0), 6.0));
    }

    #[test]
    fn test_group_members_are_averaged() {
        let mut blender = blender();
        blender.register(OwnerId(1), 1, Arc::new(StaticTimeRequest::new(1.0, 4.0)));
        blender.register(OwnerId(1), 1, Arc::new(StaticTimeRequest::new(0.5, 8.0)));

        let target = blender.target().unwrap();
        assert!(near(target.weight, 0.75));
        assert!(near(target.time, 6.0));
    }

    #[test]
    fn test_alpha_over_between_groups() {
        let mut blender = blender();
        blender.register(OwnerId(1), 10, Arc::new(StaticTimeRequest::new(0.5, 6.0)));
        blender.register(OwnerId(2), 5, Arc::new(StaticTimeRequest::new(1.0, 10.0)));

        // 0.5 of 6h, then the remaining 0.5 of 10h
        let target = blender.target().unwrap();
        assert!(near(target.weight, 1.0));
        assert!(near(target.time, 8.0));
    }

    #[test]
    fn test_half_weight_blends_short_way_round() {
        let mut blender = blender();
        blender.register(OwnerId(1), 0, Arc::new(StaticTimeRequest::new(0.5, 1.0)));

        // Natural 23h, target 1h: halfway is midnight, not noon
        let out = blender.apparent_time(23.0);
        assert!(near(out, 0.0) || near(out, 24.0), "got {}", out);
    }

    #[test]
    fn test_state_resets_when_nobody_wants_static_time() {
        let request = Arc::new(StaticTimeRequest::new(0.5, 6.0));
        let mut blender = blender();
        blender.register(OwnerId(1), 0, request.clone());

        blender.apparent_time(10.0);
        assert!(!blender.state().is_empty());

        request.set_enabled(false);
        assert_eq!(blender.apparent_time(10.0), 10.0);
        assert_eq!(*blender.state(), BlendState::default());
    }

    #[test]
    fn test_wraparound_keeps_output_continuous() {
        let mut state = BlendState::default();
        let target = StaticTimeTarget {
            weight: 0.5,
            time: 6.0,
        };

        // Natural time crosses 18h, the far side of the target
        let before = StaticTimeBlender::blend(&mut state, 24.0, 17.9, target);
        let after = StaticTimeBlender::blend(&mut state, 24.0, 18.1, target);
        assert_eq!(state.offset_band(), 1);
        assert_eq!(state.winding_count(), 1);
        assert!((after - before).abs() < 0.2, "{} -> {}", before, after);
    }

    #[test]
    fn test_crossing_target_keeps_band() {
        let mut state = BlendState::default();
        let target = StaticTimeTarget {
            weight: 0.5,
            time: 6.0,
        };
        StaticTimeBlender::blend(&mut state, 24.0, 17.9, target);
        StaticTimeBlender::blend(&mut state, 24.0, 18.1, target);
        assert_eq!(state.offset_band(), 1);

        let before = StaticTimeBlender::blend(&mut state, 24.0, 5.9, target);
        let after = StaticTimeBlender::blend(&mut state, 24.0, 6.1, target);
        assert_eq!(state.offset_band(), 1);
        assert_eq!(state.winding_count(), 1);
        assert!(shortest_delta(before, after, 24.0).abs() < 0.2, "{} -> {}", before, after);
    }

    #[test]
    fn test_partial_dwell_under_a_day_is_smooth() {
        let mut state = BlendState::default();
        let target = StaticTimeTarget {
            weight: 0.5,
            time: 6.0,
        };

        // 14h from 17:00 crosses both the far side and the target
        let mut previous = StaticTimeBlender::blend(&mut state, 24.0, 17.0, target);
        let mut worst = 0.0f32;
        for i in 1..=140 {
            let natural = (17.0 + i as f32 * 0.1).rem_euclid(24.0);
            let out = StaticTimeBlender::blend(&mut state, 24.0, natural, target);
            worst = worst.max(shortest_delta(previous, out, 24.0).abs());
            previous = out;
        }
        assert!(worst < 0.2, "worst jump {}", worst);
    }

    #[test]
    fn test_unregister() {
        let mut blender = blender();
        let a = blender.register(OwnerId(1), 0, Arc::new(StaticTimeRequest::new(1.0, 6.0)));
        blender.register(OwnerId(2), 0, Arc::new(StaticTimeRequest::new(1.0, 7.0)));
        blender.register(OwnerId(2), 1, Arc::new(StaticTimeRequest::new(1.0, 8.0)));

        assert!(blender.unregister(a));
        assert!(!blender.unregister(a));
        assert_eq!(blender.unregister_owner(OwnerId(2)), 2);
        assert!(blender.is_empty());
    }

    #[test]
    fn test_shortest_delta() {
        assert!(near(shortest_delta(1.0, 23.0, 24.0), -2.0));
        assert!(near(shortest_delta(23.0, 1.0, 24.0), 2.0));
        assert!(near(shortest_delta(6.0, 18.0, 24.0), -12.0));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn circular_distance(a: f32, b: f32, day: f32) -> f32 {
            shortest_delta(a, b, day).abs()
        }

        proptest! {
            #[test]
            fn blending_in_has_no_pops(
                target in 0.0f32..24.0,
                start in 0.0f32..24.0,
                step in 0.001f32..0.05,
                weight_step in 0.0005f32..0.01,
            ) {
                let day = 24.0;
                let request = Arc::new(StaticTimeRequest::new(0.0, target));
                let mut blender = StaticTimeBlender::new(day);
                blender.register(OwnerId(1), 0, request.clone());

                // Stay under half a day of natural time inside the blend
                let steps = ((day * 0.45) / step) as usize;
                let mut natural = start;
                let mut previous = blender.apparent_time(natural);
                for i in 1..steps {
                    natural = (natural + step).rem_euclid(day);
                    request.set_weight((i as f32 * weight_step).min(1.0));
                    let out = blender.apparent_time(natural);

                    let jump = circular_distance(previous, out, day);
                    let bound = step + weight_step * day * 1.5 + 1e-3;
                    prop_assert!(jump <= bound, "step {}: {} -> {} (bound {})", i, previous, out, bound);
                    previous = out;
                }
            }

            #[test]
            fn partial_dwell_under_a_day_has_no_pops(
                target in 0.0f32..24.0,
                start in 0.0f32..24.0,
                weight in 0.1f32..0.9,
                dwell in 0.5f32..0.95,
                step in 0.01f32..0.1,
            ) {
                let day = 24.0;
                let mut blender = StaticTimeBlender::new(day);
                blender.register(OwnerId(1), 0, Arc::new(StaticTimeRequest::new(weight, target)));

                let steps = ((day * dwell) / step) as usize;
                let mut previous = blender.apparent_time(start);
                for i in 1..steps {
                    let natural = (start + i as f32 * step).rem_euclid(day);
                    let out = blender.apparent_time(natural);

                    let jump = circular_distance(previous, out, day);
                    prop_assert!(jump <= step + 1e-3, "step {}: {} -> {}", i, previous, out);
                    previous = out;
                }
            }
        }
    }
}
