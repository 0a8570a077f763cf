//! Exponential backoff state machine used between reconnect attempts.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

const MIN_SLEEP_MS: u64 = 10;

/// Tracks reconnect attempts and produces jittered delays.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    failure_since: Option<Instant>,
    rng: StdRng,
    attempts: u32,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            failure_since: None,
            rng: StdRng::from_entropy(),
            attempts: 0,
            policy,
        }
    }

    /// Failed attempts recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Calculate the next jittered sleep duration following a failure.
    ///
    /// Returns `None` once the policy deadline has passed since the first
    /// failure of the current window.
    pub fn next_sleep(&mut self, now: Instant) -> Option<Duration> {
        let start = *self.failure_since.get_or_insert(now);
        self.attempts = self.attempts.saturating_add(1);

        if now.duration_since(start) >= self.policy.deadline {
            return None;
        }

        if self.attempts > 1 {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }

        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        Some(Duration::from_millis(sleep_ms))
    }
}
