//! Authored timeline assets
//!
//! A timeline asset is a fixed-length clip of keyframed `f32` channels and
//! named triggers. All times are in the asset's local seconds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use daycycle_core::{AssetId, ChannelId};

use crate::ComposeError;

/// One curve key
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32) -> Self {
        Keyframe { time, value }
    }
}

/// Piecewise-linear curve; held constant before the first and after the
/// last key
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl Curve {
    /// Build a curve, sorting keys by time
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Curve { keys }
    }

    pub fn constant(value: f32) -> Self {
        Curve {
            keys: vec![Keyframe::new(0.0, value)],
        }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Value at `time`, or `None` for an empty curve
    pub fn sample(&self, time: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }

        // First key strictly after `time`; guaranteed in 1..len here
        let upper = self.keys.partition_point(|k| k.time <= time);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return Some(b.value);
        }
        let alpha = (time - a.time) / span;
        Some(a.value + (b.value - a.value) * alpha)
    }
}

/// Named event fired when playback sweeps across its time
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub time: f32,
}

/// How overlapping sections resolve a shared channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Highest bias wins
    #[default]
    Override,
    /// Weighted-combined with other blending sections at the same bias
    Blend,
}

/// Authored sub-timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineAsset {
    pub id: AssetId,
    /// Authored length in seconds
    pub duration: f32,
    #[serde(default)]
    pub channels: BTreeMap<ChannelId, Curve>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub blend_mode: BlendMode,
    /// Weight used in [`BlendMode::Blend`]
    #[serde(default = "default_blend_weight")]
    pub blend_weight: f32,
}

fn default_blend_weight() -> f32 {
    1.0
}

impl TimelineAsset {
    pub fn new(id: impl Into<AssetId>, duration: f32) -> Self {
        TimelineAsset {
            id: id.into(),
            duration,
            channels: BTreeMap::new(),
            triggers: Vec::new(),
            blend_mode: BlendMode::Override,
            blend_weight: 1.0,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<ChannelId>, curve: Curve) -> Self {
        self.channels.insert(channel.into(), curve);
        self
    }

    pub fn with_trigger(mut self, name: impl Into<String>, time: f32) -> Self {
        self.triggers.push(Trigger {
            name: name.into(),
            time,
        });
        self
    }

    pub fn with_blend(mut self, weight: f32) -> Self {
        self.blend_mode = BlendMode::Blend;
        self.blend_weight = weight;
        self
    }

    /// Reject assets that cannot be stretched over a day
    pub fn validate(&self) -> Result<(), ComposeError> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ComposeError::InvalidAsset {
                asset: self.id.clone(),
                reason: format!("non-positive duration {}", self.duration),
            });
        }
        if !self.blend_weight.is_finite() || self.blend_weight < 0.0 {
            return Err(ComposeError::InvalidAsset {
                asset: self.id.clone(),
                reason: format!("invalid blend weight {}", self.blend_weight),
            });
        }
        for trigger in &self.triggers {
            if !(0.0..=self.duration).contains(&trigger.time) {
                return Err(ComposeError::InvalidAsset {
                    asset: self.id.clone(),
                    reason: format!("trigger '{}' outside of clip at {}", trigger.name, trigger.time),
                });
            }
        }
        Ok(())
    }
}

/// Source of authored assets
pub trait AssetResolver: Send + Sync {
    fn load_timeline_asset(&self, id: &AssetId) -> Result<Arc<TimelineAsset>, ComposeError>;
}

/// Assets held in memory, keyed by id
#[derive(Debug, Default)]
pub struct InMemoryAssets {
    assets: HashMap<AssetId, Arc<TimelineAsset>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an asset
    pub fn insert(&mut self, asset: TimelineAsset) -> Arc<TimelineAsset> {
        let asset = Arc::new(asset);
        self.assets.insert(asset.id.clone(), asset.clone());
        asset
    }

    pub fn remove(&mut self, id: &AssetId) -> Option<Arc<TimelineAsset>> {
        self.assets.remove(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetResolver for InMemoryAssets {
    fn load_timeline_asset(&self, id: &AssetId) -> Result<Arc<TimelineAsset>, ComposeError> {
        let asset = self
            .assets
            .get(id)
            .cloned()
            .ok_or_else(|| ComposeError::UnknownAsset(id.clone()))?;
        asset.validate()?;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_interpolates_linearly() {
        let curve = Curve::new(vec![Keyframe::new(10.0, 1.0), Keyframe::new(0.0, 0.0)]);
        assert_eq!(curve.sample(-1.0), Some(0.0));
        assert_eq!(curve.sample(5.0), Some(0.5));
        assert_eq!(curve.sample(20.0), Some(1.0));
        assert_eq!(Curve::default().sample(1.0), None);
    }

    #[test]
    fn test_curve_step_on_coincident_keys() {
        let curve = Curve::new(vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(1.0, 0.0),
            Keyframe::new(1.0, 5.0),
            Keyframe::new(2.0, 5.0),
        ]);
        assert_eq!(curve.sample(0.5), Some(0.0));
        assert_eq!(curve.sample(1.5), Some(5.0));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let asset = TimelineAsset::new("empty", 0.0);
        assert!(matches!(asset.validate(), Err(ComposeError::InvalidAsset { .. })));

        let asset = TimelineAsset::new("late", 10.0).with_trigger("bell", 11.0);
        assert!(asset.validate().is_err());
    }

    #[test]
    fn test_resolver_reports_unknown_asset() {
        let mut assets = InMemoryAssets::new();
        assets.insert(TimelineAsset::new("sky", 24.0));

        assert!(assets.load_timeline_asset(&AssetId::new("sky")).is_ok());
        assert_eq!(
            assets.load_timeline_asset(&AssetId::new("fog")).unwrap_err(),
            ComposeError::UnknownAsset(AssetId::new("fog"))
        );
    }

    #[test]
    fn test_asset_from_json() {
        let json = r#"{
            "id": "sun",
            "duration": 24.0,
            "channels": { "sun.intensity": [ { "time": 0.0, "value": 0.0 }, { "time": 12.0, "value": 1.0 } ] },
            "triggers": [ { "name": "noon", "time": 12.0 } ],
            "blend_mode": "blend"
        }"#;
        let asset: TimelineAsset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.blend_mode, BlendMode::Blend);
        assert_eq!(asset.blend_weight, 1.0);
        assert_eq!(
            asset.channels[&ChannelId::new("sun.intensity")].sample(6.0),
            Some(0.5)
        );
    }
}
