// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::time::Instant;

/// Token bucket with continuous refill.
///
/// Starts full. `try_take` refills based on elapsed time, then takes one
/// token if available. All methods take an explicit `now` so the scheduler
/// makes every decision against a single consistent clock reading.
#[derive(Debug)]
pub struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f64, capacity: f64, now: Instant) -> Self {
        Self {
            rate_per_sec: rate_per_sec.max(0.0),
            capacity: capacity.max(1.0),
            tokens: capacity.max(1.0),
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.last_refill = now;
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.rate_per_sec).min(self.capacity);
    }

    /// Take one token if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Whether a token is available without taking it.
    pub fn has_token(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= 1.0
    }

    /// Time until one token will be available. Zero when one already is.
    pub fn time_until_token(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        if self.rate_per_sec <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.rate_per_sec)
    }

    /// Empty the bucket (global-pause reset).
    pub fn drain(&mut self, now: Instant) {
        self.refill(now);
        self.tokens = 0.0;
    }
}

#[cfg(test)]
#[path = "bucket_tests.rs"]
mod tests;
