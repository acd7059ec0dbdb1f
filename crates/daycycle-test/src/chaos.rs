//! Chaos links for replication testing
//!
//! Simulates an unreliable channel for snapshots:
//! - Latency and jitter
//! - Loss, including bursts
//! - Reordering
//! - Duplication

use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    /// No jitter
    None,
    /// Uniform distribution
    Uniform { min_ms: u32, max_ms: u32 },
    /// Normal distribution (mean, stddev)
    Normal { mean_ms: f64, stddev_ms: f64 },
    /// Pareto distribution (heavy tail), capped at `cap_ms`
    Pareto { scale_ms: f64, shape: f64, cap_ms: f64 },
}

impl JitterDistribution {
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(*min_ms as u64);
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(dist.sample(rng) as u64)
            }
            JitterDistribution::Normal { mean_ms, stddev_ms } => {
                // Box-Muller
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                let value = mean_ms + stddev_ms * z;
                Duration::from_micros((value.max(0.0) * 1000.0) as u64)
            }
            JitterDistribution::Pareto {
                scale_ms,
                shape,
                cap_ms,
            } => {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let value = scale_ms / u.powf(1.0 / shape);
                Duration::from_micros((value.min(*cap_ms) * 1000.0) as u64)
            }
        }
    }

    /// Largest jitter this distribution can produce, if bounded
    pub fn upper_bound(&self) -> Option<Duration> {
        match self {
            JitterDistribution::None => Some(Duration::ZERO),
            JitterDistribution::Uniform { min_ms, max_ms } => {
                Some(Duration::from_millis((*min_ms).max(*max_ms) as u64))
            }
            JitterDistribution::Normal { .. } => None,
            JitterDistribution::Pareto { cap_ms, .. } => {
                Some(Duration::from_micros((cap_ms * 1000.0) as u64))
            }
        }
    }
}

/// Link chaos configuration
#[derive(Clone, Debug)]
pub struct ChaosConfig {
    pub base_latency: Duration,
    pub jitter: JitterDistribution,
    /// Loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    pub burst_loss_prob: f64,
    /// Burst loss length range
    pub burst_length: (u32, u32),
    pub reorder_prob: f64,
    pub duplicate_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(50),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 50,
            },
            loss_rate: 0.01,
            burst_loss_prob: 0.02,
            burst_length: (2, 5),
            reorder_prob: 0.05,
            duplicate_prob: 0.01,
        }
    }
}

impl ChaosConfig {
    /// Lossless, fixed latency
    pub fn perfect(latency: Duration) -> Self {
        ChaosConfig {
            base_latency: latency,
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            duplicate_prob: 0.0,
        }
    }

    /// Good network conditions
    pub fn good() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(20),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 10,
            },
            loss_rate: 0.001,
            burst_loss_prob: 0.01,
            burst_length: (1, 2),
            reorder_prob: 0.01,
            duplicate_prob: 0.001,
        }
    }

    /// Poor network conditions
    pub fn poor() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(100),
            jitter: JitterDistribution::Pareto {
                scale_ms: 20.0,
                shape: 1.5,
                cap_ms: 150.0,
            },
            loss_rate: 0.05,
            burst_loss_prob: 0.05,
            burst_length: (3, 8),
            reorder_prob: 0.1,
            duplicate_prob: 0.02,
        }
    }

    /// Hostile network conditions
    pub fn hostile() -> Self {
        ChaosConfig {
            base_latency: Duration::from_millis(200),
            jitter: JitterDistribution::Pareto {
                scale_ms: 50.0,
                shape: 1.2,
                cap_ms: 400.0,
            },
            loss_rate: 0.15,
            burst_loss_prob: 0.1,
            burst_length: (5, 15),
            reorder_prob: 0.2,
            duplicate_prob: 0.05,
        }
    }

    /// Worst-case one-way delay, if the jitter is bounded
    pub fn max_latency(&self) -> Option<Duration> {
        self.jitter.upper_bound().map(|j| self.base_latency + j)
    }
}

#[derive(Clone, Debug)]
struct InFlight<T> {
    item: T,
    delivery_time: Duration,
    send_time: Duration,
}

/// Chaos link statistics
#[derive(Clone, Debug, Default)]
pub struct ChaosStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
    pub reordered: u64,
    pub duplicated: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl ChaosStats {
    pub fn loss_rate(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            self.lost as f64 / self.sent as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.delivered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.delivered as f64
        }
    }
}

/// One-directional unreliable link
pub struct ChaosLink<T> {
    config: ChaosConfig,
    rng: StdRng,
    in_flight: Vec<InFlight<T>>,
    current_time: Duration,
    burst_remaining: u32,
    stats: ChaosStats,
}

impl<T: Clone> ChaosLink<T> {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        ChaosLink {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            current_time: Duration::ZERO,
            burst_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Send an item at the current link time
    pub fn send(&mut self, item: T) {
        self.stats.sent += 1;

        if self.should_drop() {
            self.stats.lost += 1;
            return;
        }

        let jitter = self.config.jitter.sample(&mut self.rng);
        let mut delivery_time = self.current_time + self.config.base_latency + jitter;

        // Overtake whatever is still in flight
        if self.rng.gen::<f64>() < self.config.reorder_prob {
            if let Some(earliest) = self.in_flight.iter().map(|p| p.delivery_time).min() {
                if earliest > self.current_time && earliest < delivery_time {
                    delivery_time = earliest;
                    self.stats.reordered += 1;
                }
            }
        }

        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            let jitter = self.config.jitter.sample(&mut self.rng);
            self.in_flight.push(InFlight {
                item: item.clone(),
                delivery_time: self.current_time + self.config.base_latency + jitter,
                send_time: self.current_time,
            });
            self.stats.duplicated += 1;
        }

        self.in_flight.push(InFlight {
            item,
            delivery_time,
            send_time: self.current_time,
        });
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        if self.config.burst_loss_prob > 0.0 && self.rng.gen::<f64>() < self.config.burst_loss_prob {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = self.rng.gen_range(min..=max.max(min));
            return true;
        }

        self.rng.gen::<f64>() < self.config.loss_rate
    }

    /// Advance link time and collect due items, earliest first
    pub fn tick(&mut self, dt: Duration) -> Vec<T> {
        self.current_time += dt;

        let now = self.current_time;
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|p| p.delivery_time <= now);
        self.in_flight = pending;
        due.sort_by_key(|p| p.delivery_time);

        due.into_iter()
            .map(|packet| {
                let latency = (packet.delivery_time - packet.send_time).as_millis() as u64;
                self.stats.delivered += 1;
                self.stats.total_latency_ms += latency;
                self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);
                packet.item
            })
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }
}
