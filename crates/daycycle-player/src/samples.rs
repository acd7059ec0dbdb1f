//! Server-time samples for smoothed reconciliation
//!
//! Each snapshot a passive player reacts to is recorded as the authority's
//! position (in seconds) plus the local wall time it arrived. Reprojecting
//! every sample to "now" and averaging gives a jitter-resistant estimate of
//! where the authority currently is.

use crate::NetSyncConfig;

/// Minimum retained samples before the estimate is trusted
pub const MIN_SAMPLES_FOR_ESTIMATE: usize = 10;

/// One observation of the authority's position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServerTimeSample {
    /// Authority position in sequence seconds
    pub server_time: f64,
    /// Local wall-clock time the sample was taken
    pub received_at: f64,
}

impl ServerTimeSample {
    /// Position the authority should have reached by `now`
    #[inline]
    pub fn project(&self, now: f64, rate: f64) -> f64 {
        self.server_time + (now - self.received_at) * rate
    }
}

/// Result of smoothing the retained samples
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ServerTimeEstimate {
    /// Mean of the retained, reprojected samples (sequence seconds)
    Smoothed(f64),
    /// Too few samples, or too many culled; use the local position
    Insufficient,
}

impl ServerTimeEstimate {
    pub fn seconds_or(self, fallback: f64) -> f64 {
        match self {
            ServerTimeEstimate::Smoothed(seconds) => seconds,
            ServerTimeEstimate::Insufficient => fallback,
        }
    }
}

/// Bounded, age-culled set of server-time samples
#[derive(Clone, Debug)]
pub struct ServerTimeSamples {
    samples: Vec<ServerTimeSample>,
    config: NetSyncConfig,
    /// Effective dilation the samples are currently projected with
    last_dilation: f32,
}

impl ServerTimeSamples {
    pub fn new(config: NetSyncConfig) -> Self {
        ServerTimeSamples {
            samples: Vec::with_capacity(config.max_sample_count + 1),
            config,
            last_dilation: 1.0,
        }
    }

    pub fn config(&self) -> &NetSyncConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ServerTimeSample] {
        &self.samples
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Record a sample; samples arrive in wall-clock order
    pub fn add(&mut self, server_time: f64, received_at: f64) {
        self.samples.push(ServerTimeSample {
            server_time,
            received_at,
        });
    }

    /// Cull, compact and average the samples as of `now`.
    ///
    /// `play_rate` and `dilation` describe how fast the authority's position
    /// advances per wall second.
    pub fn estimate(&mut self, now: f64, play_rate: f32, dilation: f32) -> ServerTimeEstimate {
        self.cull_expired(now);
        self.compact();

        if self.samples.len() < MIN_SAMPLES_FOR_ESTIMATE {
            self.reproject_for_dilation(now, play_rate, dilation);
            return ServerTimeEstimate::Insufficient;
        }

        let rate = play_rate as f64 * self.last_dilation as f64;
        let count = self.samples.len() as f64;
        let mean = self.samples.iter().map(|s| s.project(now, rate)).sum::<f64>() / count;
        let variance = self
            .samples
            .iter()
            .map(|s| {
                let d = s.project(now, rate) - mean;
                d * d
            })
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();

        let original = self.samples.len();
        let mut estimate = mean;

        if std_dev > self.config.deviation_threshold_seconds() {
            self.samples.retain(|s| (s.project(now, rate) - mean).abs() <= std_dev);
            if !self.samples.is_empty() {
                estimate = self.samples.iter().map(|s| s.project(now, rate)).sum::<f64>()
                    / self.samples.len() as f64;
            }
        }

        self.reproject_for_dilation(now, play_rate, dilation);

        if !self.samples.is_empty() && self.samples.len() >= original / 2 {
            ServerTimeEstimate::Smoothed(estimate)
        } else {
            ServerTimeEstimate::Insufficient
        }
    }

    fn cull_expired(&mut self, now: f64) {
        let oldest = now - self.config.max_sample_age_seconds();
        let first_valid = self.samples.partition_point(|s| s.received_at < oldest);
        self.samples.drain(..first_valid);
    }

    /// Uniformly resample down to `max_sample_count`, keeping order and the
    /// newest sample
    fn compact(&mut self) {
        let max = self.config.max_sample_count.max(1);
        let len = self.samples.len();
        if len <= max {
            return;
        }

        let compacted: Vec<ServerTimeSample> = if max == 1 {
            self.samples[len - 1..].to_vec()
        } else {
            let step = (len - 1) as f64 / (max - 1) as f64;
            (0..max)
                .map(|i| {
                    let index = ((i as f64 * step).round() as usize).min(len - 1);
                    self.samples[index]
                })
                .collect()
        };
        self.samples = compacted;
    }

    /// Rewrite receive times so the samples project identically under the
    /// new dilation
    fn reproject_for_dilation(&mut self, now: f64, play_rate: f32, dilation: f32) {
        if self.last_dilation == dilation {
            return;
        }

        let old_rate = play_rate as f64 * self.last_dilation as f64;
        let new_rate = play_rate as f64 * dilation as f64;
        if new_rate != 0.0 {
            for sample in &mut self.samples {
                let projected = sample.project(now, old_rate);
                sample.received_at = now - (projected - sample.server_time) / new_rate;
            }
        }
        self.last_dilation = dilation;
    }
}

impl Default for ServerTimeSamples {
    fn default() -> Self {
        Self::new(NetSyncConfig::default())
    }
}
