//! Playback and network-sync settings

use serde::{Deserialize, Serialize};

/// How often a player is updated and how much time evaluation may take
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickInterval {
    /// Minimum seconds between updates (0 = every host tick)
    pub interval_seconds: f32,
    /// Microseconds a single flush may spend evaluating (0 = unbounded)
    pub evaluation_budget_us: u32,
    /// Keep updating while the world is paused
    pub tick_when_paused: bool,
}

impl Default for TickInterval {
    fn default() -> Self {
        TickInterval {
            interval_seconds: 0.0,
            evaluation_budget_us: 0,
            tick_when_paused: false,
        }
    }
}

impl TickInterval {
    /// Evaluation budget in seconds, `None` when unbounded
    pub fn budget_seconds(&self) -> Option<f64> {
        if self.evaluation_budget_us == 0 {
            None
        } else {
            Some(self.evaluation_budget_us as f64 / 1_000_000.0)
        }
    }
}

/// Playback settings for a player
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Signed play rate; negative plays backwards
    pub play_rate: f32,
    /// Extra loops after the first play-through; `-1` loops forever
    pub loop_count: i32,
    /// Pause rather than stop when playback finishes
    pub pause_at_end: bool,
    /// Offset from the timeline start, in seconds
    pub start_offset: f32,
    /// Start at a random frame instead of `start_offset`
    pub random_start: bool,
    pub tick_interval: TickInterval,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        PlaybackSettings {
            play_rate: 1.0,
            loop_count: 0,
            pause_at_end: false,
            start_offset: 0.0,
            random_start: false,
            tick_interval: TickInterval::default(),
        }
    }
}

impl PlaybackSettings {
    /// Settings for an endlessly cycling day
    pub fn looping(play_rate: f32) -> Self {
        PlaybackSettings {
            play_rate,
            loop_count: -1,
            ..Default::default()
        }
    }

    #[inline]
    pub fn loops_forever(&self) -> bool {
        self.loop_count < 0
    }
}

/// Tunables for reconciling passive players against the authority
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSyncConfig {
    /// Lag tolerated before a passive player is forcibly resynchronised
    pub threshold_ms: u32,
    /// Age after which server-time samples are culled (0 disables smoothing)
    pub max_sample_age_ms: u32,
    /// Upper bound on retained samples
    pub max_sample_count: usize,
    /// Spread beyond which outlying samples are discarded
    pub deviation_threshold_ms: u32,
}

impl Default for NetSyncConfig {
    fn default() -> Self {
        NetSyncConfig {
            threshold_ms: 200,
            max_sample_age_ms: 5000,
            max_sample_count: 50,
            deviation_threshold_ms: 200,
        }
    }
}

impl NetSyncConfig {
    /// Resynchronise against each raw snapshot
    pub fn unsmoothed() -> Self {
        NetSyncConfig {
            max_sample_age_ms: 0,
            ..Default::default()
        }
    }

    /// Looser tolerances for high-latency links
    pub fn high_latency() -> Self {
        NetSyncConfig {
            threshold_ms: 400,
            max_sample_age_ms: 8000,
            max_sample_count: 80,
            deviation_threshold_ms: 300,
        }
    }

    #[inline]
    pub fn smoothing_enabled(&self) -> bool {
        self.max_sample_age_ms != 0
    }

    #[inline]
    pub fn threshold_seconds(&self) -> f64 {
        self.threshold_ms as f64 * 0.001
    }

    #[inline]
    pub fn max_sample_age_seconds(&self) -> f64 {
        self.max_sample_age_ms as f64 * 0.001
    }

    #[inline]
    pub fn deviation_threshold_seconds(&self) -> f64 {
        self.deviation_threshold_ms as f64 * 0.001
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_sync_defaults() {
        let config = NetSyncConfig::default();
        assert_eq!(config.threshold_ms, 200);
        assert_eq!(config.max_sample_age_ms, 5000);
        assert_eq!(config.max_sample_count, 50);
        assert!(config.smoothing_enabled());
        assert!(!NetSyncConfig::unsmoothed().smoothing_enabled());
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: PlaybackSettings =
            serde_json::from_str(r#"{ "play_rate": 0.5, "loop_count": -1 }"#).unwrap();
        assert!(settings.loops_forever());
        assert!(!settings.pause_at_end);
        assert_eq!(settings.tick_interval, TickInterval::default());
    }
}
