//! Day cycle configuration
//!
//! Loaded from JSON; every field has a default so partial documents work.
//! `time_per_cycle` is a human-readable duration such as `"20m"`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use daycycle_core::{DayCycleError, MAX_DAY_LENGTH_HOURS};
use daycycle_player::{NetSyncConfig, PlaybackSettings};

use crate::LoggingConfig;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid day length {0}h (expected 0 < hours <= {max})", max = MAX_DAY_LENGTH_HOURS)]
    InvalidDayLength(f32),

    #[error("time per cycle must be positive")]
    ZeroCycleDuration,

    #[error("initial time of day {0} outside of the day")]
    InvalidInitialTime(f32),

    #[error("invalid update interval override {0}")]
    InvalidIntervalOverride(f32),

    #[error("invalid network sync settings: {0}")]
    InvalidNetSync(String),

    #[error("invalid logging directive: {0}")]
    InvalidLogDirective(String),

    #[error("logging already initialised: {0}")]
    LoggingInit(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<ConfigError> for DayCycleError {
    fn from(err: ConfigError) -> Self {
        DayCycleError::Config(err.to_string())
    }
}

/// Complete configuration of one day cycle host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayCycleConfig {
    /// Hours in one day
    pub day_length_hours: f32,
    /// Real time one full day takes
    #[serde(with = "duration_str")]
    pub time_per_cycle: Duration,
    /// Hour the cycle starts at
    pub initial_time_of_day: f32,
    /// Start advancing as soon as the host is created
    pub run_day_cycle: bool,
    /// Added to every sub-timeline's bias
    pub bias: i32,
    /// `play_rate` scales the cycle rate; `start_offset` is replaced by
    /// `initial_time_of_day`
    pub playback: PlaybackSettings,
    pub net_sync: NetSyncConfig,
    /// Update interval while an override handle is alive, in seconds
    pub update_interval_override: f32,
    pub logging: LoggingConfig,
}

impl Default for DayCycleConfig {
    fn default() -> Self {
        DayCycleConfig {
            day_length_hours: 24.0,
            time_per_cycle: Duration::from_secs(20 * 60),
            initial_time_of_day: 6.0,
            run_day_cycle: true,
            bias: 0,
            playback: PlaybackSettings::looping(1.0),
            net_sync: NetSyncConfig::default(),
            update_interval_override: 0.05,
            logging: LoggingConfig::default(),
        }
    }
}

impl DayCycleConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DayCycleConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let day = self.day_length_hours;
        if !day.is_finite() || day <= 0.0 || day > MAX_DAY_LENGTH_HOURS {
            return Err(ConfigError::InvalidDayLength(day));
        }
        if self.time_per_cycle.is_zero() {
            return Err(ConfigError::ZeroCycleDuration);
        }
        let initial = self.initial_time_of_day;
        if !initial.is_finite() || initial < 0.0 || initial >= day {
            return Err(ConfigError::InvalidInitialTime(initial));
        }
        let interval = self.update_interval_override;
        if !interval.is_finite() || interval < 0.0 {
            return Err(ConfigError::InvalidIntervalOverride(interval));
        }
        if self.net_sync.max_sample_count == 0 && self.net_sync.smoothing_enabled() {
            return Err(ConfigError::InvalidNetSync(
                "max_sample_count must be positive when smoothing".to_owned(),
            ));
        }
        Ok(())
    }

    /// Root seconds (hours of day) per real second
    pub fn cycle_play_rate(&self) -> f32 {
        let seconds = self.time_per_cycle.as_secs_f32();
        if seconds > 0.0 {
            self.day_length_hours / seconds * self.playback.play_rate
        } else {
            0.0
        }
    }

    /// Playback settings handed to the player
    pub fn player_settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            play_rate: self.cycle_play_rate(),
            start_offset: self.initial_time_of_day,
            ..self.playback
        }
    }
}

/// `Duration` as a humantime string
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
