//! Root timeline composition and evaluation
//!
//! Every entry becomes a section spanning the whole root, scaled so one
//! root play-through is one play-through of the entry's asset. Sections are
//! rebuilt wholesale whenever the set of entries changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use daycycle_core::{
    root_duration_frames, AssetId, ChannelId, EvaluationRequest, FrameRate, FrameTime,
    PlayDirection, PlayerStatus, DEFAULT_TICK_RESOLUTION, MAX_DAY_LENGTH_HOURS,
    ROOT_DISPLAY_RATE,
};

use crate::{
    AssetResolver, BlendMode, ConditionRegistry, EntryActivation, SubTimelineEntry,
    TimelineAsset, TimelineCollection,
};

/// One composed sub-timeline
pub struct Section {
    entry: SubTimelineEntry,
    asset: Arc<TimelineAsset>,
    bias: i32,
    time_scale: f64,
    activation: Arc<EntryActivation>,
}

impl Section {
    pub fn entry(&self) -> &SubTimelineEntry {
        &self.entry
    }

    pub fn asset(&self) -> &Arc<TimelineAsset> {
        &self.asset
    }

    /// Entry bias plus owner bias
    pub fn bias(&self) -> i32 {
        self.bias
    }

    /// Authored duration over root duration
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    /// Asset-local seconds at a root time in seconds
    pub fn local_time(&self, root_seconds: f64) -> f32 {
        (root_seconds * self.time_scale) as f32
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("asset", &self.entry.asset)
            .field("bias", &self.bias)
            .field("time_scale", &self.time_scale)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Outcome of [`RootTimeline::compose`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositionChange {
    /// Same entries as before; sections were reused
    Reused,
    /// Sections were discarded and recreated
    Rebuilt { sections: usize, skipped: usize },
}

/// Which side of a rebuild a hook runs on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositionPhase {
    PreChange,
    PostChange,
}

type CompositionHook = Box<dyn FnMut(CompositionPhase) + Send>;

/// Trigger crossed during an evaluation
#[derive(Clone, Debug, PartialEq)]
pub struct FiredTrigger {
    pub asset: AssetId,
    pub name: String,
    /// Root time in tick resolution
    pub time: FrameTime,
}

/// Result of evaluating the root timeline at one request
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Root time in tick resolution
    pub time: FrameTime,
    /// Hours of day at `time`
    pub hours: f32,
    pub status: PlayerStatus,
    pub channels: BTreeMap<ChannelId, f32>,
    /// Ordered along the play direction
    pub triggers: Vec<FiredTrigger>,
    /// Sections whose active flag changed since the previous evaluation
    pub invalidated: Vec<AssetId>,
}

struct Contribution {
    bias: i32,
    mode: BlendMode,
    weight: f32,
    value: f32,
}

/// The composed day
pub struct RootTimeline {
    day_length_hours: f32,
    owner_bias: i32,
    tick_resolution: FrameRate,
    sections: Vec<Section>,
    /// Entries the current sections were built from, in order
    tracked: Vec<SubTimelineEntry>,
    hooks: Vec<CompositionHook>,
}

impl RootTimeline {
    pub fn new(day_length_hours: f32) -> Self {
        RootTimeline {
            day_length_hours: clamp_day_length(day_length_hours),
            owner_bias: 0,
            tick_resolution: DEFAULT_TICK_RESOLUTION,
            sections: Vec::new(),
            tracked: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn with_owner_bias(mut self, bias: i32) -> Self {
        self.owner_bias = bias;
        self
    }

    /// Run `hook` around every full rebuild
    pub fn add_composition_hook<F>(&mut self, hook: F)
    where
        F: FnMut(CompositionPhase) + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn day_length_hours(&self) -> f32 {
        self.day_length_hours
    }

    /// Change the day length; every section's time scale follows
    pub fn set_day_length(&mut self, hours: f32) {
        let hours = clamp_day_length(hours);
        if hours == self.day_length_hours {
            return;
        }
        self.day_length_hours = hours;
        let root_seconds = self.duration_seconds();
        for section in &mut self.sections {
            section.time_scale = time_scale(&section.asset, root_seconds);
        }
        debug!("Day length set to {}h ({} frames)", hours, self.duration_frames());
    }

    pub fn owner_bias(&self) -> i32 {
        self.owner_bias
    }

    pub fn set_owner_bias(&mut self, bias: i32) {
        self.owner_bias = bias;
        for section in &mut self.sections {
            section.bias = section.entry.bias_offset + bias;
        }
    }

    /// Root duration in display frames
    pub fn duration_frames(&self) -> i64 {
        root_duration_frames(self.day_length_hours)
    }

    pub fn duration_seconds(&self) -> f64 {
        ROOT_DISPLAY_RATE.as_seconds(FrameTime::from_frame(self.duration_frames()))
    }

    pub fn display_rate(&self) -> FrameRate {
        ROOT_DISPLAY_RATE
    }

    pub fn tick_resolution(&self) -> FrameRate {
        self.tick_resolution
    }

    /// Exclusive end of the root in tick resolution
    pub fn end_ticks(&self) -> FrameTime {
        FrameRate::transform_time(
            FrameTime::from_frame(self.duration_frames()),
            ROOT_DISPLAY_RATE,
            self.tick_resolution,
        )
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, asset: &AssetId) -> Option<&Section> {
        self.sections.iter().find(|s| &s.entry.asset == asset)
    }

    /// Build sections for `collections`, reusing the current ones when the
    /// requested entries are unchanged
    pub fn compose(
        &mut self,
        collections: &[TimelineCollection],
        resolver: &dyn AssetResolver,
        registry: &mut ConditionRegistry,
    ) -> CompositionChange {
        let requested: Vec<SubTimelineEntry> = collections
            .iter()
            .flat_map(|c| c.entries.iter().cloned())
            .collect();

        if !self.tracked.is_empty() && requested == self.tracked {
            self.refresh(registry);
            trace!("Composition unchanged, reused {} section(s)", self.sections.len());
            return CompositionChange::Reused;
        }

        self.run_hooks(CompositionPhase::PreChange);

        // Dropping the old sections drops their activations; condition
        // observer lists prune them on the next broadcast
        self.sections.clear();
        let root_seconds = self.duration_seconds();
        let mut skipped = 0;
        for entry in &requested {
            let asset = match resolver.load_timeline_asset(&entry.asset) {
                Ok(asset) => asset,
                Err(err) => {
                    warn!("Skipping sub-timeline {}: {}", entry.asset, err);
                    skipped += 1;
                    continue;
                }
            };

            let activation = EntryActivation::new(entry.conditions.clone());
            activation.bind(registry);
            self.sections.push(Section {
                entry: entry.clone(),
                time_scale: time_scale(&asset, root_seconds),
                asset,
                bias: entry.bias_offset + self.owner_bias,
                activation,
            });
        }
        self.tracked = requested;

        self.run_hooks(CompositionPhase::PostChange);
        debug!(
            "Rebuilt root timeline: {} section(s), {} skipped",
            self.sections.len(),
            skipped
        );
        CompositionChange::Rebuilt {
            sections: self.sections.len(),
            skipped,
        }
    }

    /// Discard all sections
    pub fn clear(&mut self) {
        if self.sections.is_empty() && self.tracked.is_empty() {
            return;
        }
        self.run_hooks(CompositionPhase::PreChange);
        self.sections.clear();
        self.tracked.clear();
        self.run_hooks(CompositionPhase::PostChange);
    }

    /// Recompute active flags and time scales of the current sections
    pub fn refresh(&mut self, registry: &ConditionRegistry) {
        let root_seconds = self.duration_seconds();
        for section in &mut self.sections {
            section.activation.refresh(registry);
            section.time_scale = time_scale(&section.asset, root_seconds);
        }
    }

    fn run_hooks(&mut self, phase: CompositionPhase) {
        for hook in &mut self.hooks {
            hook(phase);
        }
    }

    /// Sample channels at the request's position and collect triggers
    /// crossed by its range
    pub fn evaluate(&self, request: &EvaluationRequest) -> Evaluation {
        let rate = request.range.rate;
        let time = request.range.to;
        let root_seconds = rate.as_seconds(time);

        let invalidated = self
            .sections
            .iter()
            .filter(|s| s.activation.take_dirty())
            .map(|s| s.entry.asset.clone())
            .collect();

        let mut contributions: BTreeMap<ChannelId, Vec<Contribution>> = BTreeMap::new();
        for section in self.sections.iter().filter(|s| s.is_active()) {
            let local = section.local_time(root_seconds);
            for (channel, curve) in &section.asset.channels {
                if let Some(value) = curve.sample(local) {
                    contributions
                        .entry(channel.clone())
                        .or_default()
                        .push(Contribution {
                            bias: section.bias,
                            mode: section.asset.blend_mode,
                            weight: section.asset.blend_weight,
                            value,
                        });
                }
            }
        }
        let channels = contributions
            .into_iter()
            .filter_map(|(channel, values)| resolve_channel(&values).map(|v| (channel, v)))
            .collect();

        let triggers = if request.fires_triggers() {
            self.collect_triggers(request)
        } else {
            Vec::new()
        };

        Evaluation {
            time,
            hours: root_seconds as f32,
            status: request.status,
            channels,
            triggers,
            invalidated,
        }
    }

    fn collect_triggers(&self, request: &EvaluationRequest) -> Vec<FiredTrigger> {
        let rate = request.range.rate;
        let mut fired = Vec::new();
        for section in self.sections.iter().filter(|s| s.is_active()) {
            if section.time_scale <= 0.0 {
                continue;
            }
            for trigger in &section.asset.triggers {
                let root_seconds = trigger.time as f64 / section.time_scale;
                let time = rate.as_frame_time(root_seconds);
                if !request.range.sweeps(time) {
                    continue;
                }
                if request.is_suppressed(time) {
                    trace!("Suppressed trigger {} at {}", trigger.name, time);
                    continue;
                }
                fired.push(FiredTrigger {
                    asset: section.entry.asset.clone(),
                    name: trigger.name.clone(),
                    time,
                });
            }
        }

        fired.sort_by(|a, b| a.time.cmp(&b.time));
        if request.range.direction == PlayDirection::Backwards {
            fired.reverse();
        }
        fired
    }
}

impl fmt::Debug for RootTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootTimeline")
            .field("day_length_hours", &self.day_length_hours)
            .field("owner_bias", &self.owner_bias)
            .field("sections", &self.sections)
            .finish()
    }
}

fn clamp_day_length(hours: f32) -> f32 {
    if hours.is_finite() {
        hours.clamp(0.0, MAX_DAY_LENGTH_HOURS)
    } else {
        0.0
    }
}

fn time_scale(asset: &TimelineAsset, root_seconds: f64) -> f64 {
    if root_seconds > 0.0 {
        asset.duration as f64 / root_seconds
    } else {
        0.0
    }
}

/// Highest bias wins. If every contribution at that bias blends, they are
/// combined by weight; otherwise the first overriding one is used.
fn resolve_channel(values: &[Contribution]) -> Option<f32> {
    let top = values.iter().map(|c| c.bias).max()?;
    let leaders = values.iter().filter(|c| c.bias == top);

    if let Some(winner) = leaders.clone().find(|c| c.mode == BlendMode::Override) {
        return Some(winner.value);
    }

    let (sum, weight) = leaders.fold((0.0f32, 0.0f32), |(sum, weight), c| {
        (sum + c.value * c.weight, weight + c.weight)
    });
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        values.iter().find(|c| c.bias == top).map(|c| c.value)
    }
}
