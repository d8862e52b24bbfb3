//! How long the consumer waits between broker reconnects.
//!
//! The wait starts at one second and doubles after every failed cycle until it
//! reaches a minute. A cycle that gets as far as subscribing to the queue
//! counts as healthy and puts the wait back to one second. With
//! `max_attempts` set, the consumer stops retrying after that many failed
//! cycles in a row and surfaces a connection error.

use std::time::Duration;

use rand::Rng;

/// Backoff knobs for [`QueueConsumer`](crate::QueueConsumer).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of each wait that is randomized, so several consumers
    /// restarted together do not hit the broker in lockstep.
    pub jitter_factor: f64,
    /// 0 retries forever.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// Running backoff state for one consumer.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    next_wait: Duration,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            next_wait: config.initial_delay,
            failures: 0,
            config,
        }
    }

    /// Record a failed cycle and return how long to sleep before the next one.
    ///
    /// `None` means the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let budget = self.config.max_attempts;
        if budget != 0 && self.failures >= budget {
            return None;
        }
        self.failures += 1;

        let wait = self.jittered(self.next_wait);
        self.next_wait = self.grown(self.next_wait);
        Some(wait)
    }

    /// The consumer is subscribed again; the next failure starts from scratch.
    pub fn reset(&mut self) {
        self.next_wait = self.config.initial_delay;
        self.failures = 0;
    }

    /// Consecutive failed cycles since the last reset.
    pub fn attempt_count(&self) -> u32 {
        self.failures
    }

    fn grown(&self, wait: Duration) -> Duration {
        let cap = u64::try_from(self.config.max_delay.as_millis()).unwrap_or(u64::MAX);
        let millis = (wait.as_millis() as f64 * self.config.multiplier).round();
        if !millis.is_finite() || millis <= 0.0 {
            return Duration::from_millis(cap);
        }
        Duration::from_millis((millis as u64).min(cap))
    }

    fn jittered(&self, wait: Duration) -> Duration {
        let spread = wait.as_millis() as f64 * self.config.jitter_factor;
        if spread <= 0.0 {
            return wait;
        }
        let offset = rand::rng().random_range(-spread..=spread);
        Duration::from_millis((wait.as_millis() as f64 + offset).max(1.0) as u64)
    }
}
