//! Retry schedules.
//!
//! A [`RetryPolicy`] bounds the number of attempts and produces the wait between
//! consecutive attempts through a [`Backoff`] iterator.

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_CONSTANT_DURATION: Duration = Duration::from_secs(5);
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

/// How the wait between attempts evolves.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Wait the same duration before every retry.
    Constant { duration: Duration },
    /// Grow the wait multiplicatively up to `max_interval`, with optional jitter.
    Exponential {
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        randomization_factor: f64,
    },
}

/// A named retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub backoff: BackoffPolicy,
    /// Retries after the first attempt; `None` retries until the caller gives up.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn constant(duration: Duration, max_retries: Option<u32>) -> Self {
        Self { backoff: BackoffPolicy::Constant { duration }, max_retries }
    }

    /// Total attempts allowed, including the first; `None` when unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_retries.map(|retries| retries.saturating_add(1))
    }

    /// A fresh backoff sequence for one call.
    pub fn backoff(&self) -> Backoff {
        let current = match &self.backoff {
            BackoffPolicy::Constant { duration } => *duration,
            BackoffPolicy::Exponential { initial_interval, .. } => *initial_interval,
        };
        Backoff { policy: self.backoff.clone(), current }
    }
}

/// Infinite sequence of waits between attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        match &self.policy {
            BackoffPolicy::Constant { duration } => Some(*duration),
            BackoffPolicy::Exponential {
                multiplier, max_interval, randomization_factor, ..
            } => {
                let wait = randomize(self.current, *randomization_factor);
                let grown = self.current.as_secs_f64() * multiplier;
                self.current = if grown >= max_interval.as_secs_f64() {
                    *max_interval
                } else {
                    Duration::from_secs_f64(grown)
                };
                Some(wait)
            }
        }
    }
}

fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || interval.is_zero() {
        return interval;
    }
    let base = interval.as_secs_f64();
    let delta = factor * base;
    let jittered = rand::thread_rng().gen_range((base - delta)..=(base + delta));
    Duration::from_secs_f64(jittered.max(0.0))
}
