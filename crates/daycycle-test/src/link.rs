//! Reliable ordered link for explicit events

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::JitterDistribution;

/// Delivers every item exactly once, in send order, after a delay.
///
/// Jitter only ever delays an item; it never lets one overtake another.
pub struct ReliableLink<T> {
    latency: Duration,
    jitter: JitterDistribution,
    rng: StdRng,
    queue: VecDeque<(Duration, T)>,
    current_time: Duration,
    delivered: u64,
}

impl<T> ReliableLink<T> {
    pub fn new(latency: Duration) -> Self {
        Self::with_jitter(latency, JitterDistribution::None, 0)
    }

    pub fn with_jitter(latency: Duration, jitter: JitterDistribution, seed: u64) -> Self {
        ReliableLink {
            latency,
            jitter,
            rng: StdRng::seed_from_u64(seed),
            queue: VecDeque::new(),
            current_time: Duration::ZERO,
            delivered: 0,
        }
    }

    pub fn send(&mut self, item: T) {
        let mut delivery = self.current_time + self.latency + self.jitter.sample(&mut self.rng);
        if let Some((last, _)) = self.queue.back() {
            delivery = delivery.max(*last);
        }
        self.queue.push_back((delivery, item));
    }

    /// Advance link time and collect due items in order
    pub fn tick(&mut self, dt: Duration) -> Vec<T> {
        self.current_time += dt;
        let mut due = Vec::new();
        while self
            .queue
            .front()
            .map_or(false, |(delivery, _)| *delivery <= self.current_time)
        {
            if let Some((_, item)) = self.queue.pop_front() {
                due.push(item);
            }
        }
        self.delivered += due.len() as u64;
        due
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}
