// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backoff controller for classified resource errors.
//!
//! Headroom breaches, multiplexer unavailability, and host rate limits feed
//! this controller. Each error stretches the delay geometrically; a run of
//! `max_consecutive_failures` trips a global pause, after which the
//! scheduler resets every per-type bucket to empty.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::BackoffConfig;

/// What the scheduler should do after recording a resource error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// Hold admissions until the embedded instant.
    Delay(Instant),
    /// Enter a global pause until the embedded instant and reset buckets.
    GlobalPause(Instant),
}

#[derive(Debug)]
pub struct BackoffController {
    config: BackoffConfig,
    current_delay: Duration,
    consecutive_failures: u32,
    hold_until: Option<Instant>,
}

impl BackoffController {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay();
        Self {
            config,
            current_delay: initial,
            consecutive_failures: 0,
            hold_until: None,
        }
    }

    /// Record one classified resource error.
    pub fn on_resource_error(&mut self, now: Instant) -> BackoffAction {
        self.consecutive_failures += 1;

        if self.consecutive_failures >= self.config.max_consecutive_failures {
            let until = now + self.config.global_pause();
            self.hold_until = Some(until);
            // The streak is spent; the pause itself is the penalty.
            self.consecutive_failures = 0;
            self.current_delay = self.config.initial_delay();
            return BackoffAction::GlobalPause(until);
        }

        let until = now + self.current_delay;
        self.hold_until = Some(until);
        let next =
            Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier);
        self.current_delay = next.min(self.config.max_delay());
        BackoffAction::Delay(until)
    }

    /// Record a success: the streak and the delay reset.
    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_delay = self.config.initial_delay();
        self.hold_until = None;
    }

    /// Whether admissions are currently held back.
    pub fn holding(&self, now: Instant) -> bool {
        self.hold_until.is_some_and(|until| now < until)
    }

    /// When the current hold expires, if any.
    pub fn hold_until(&self) -> Option<Instant> {
        self.hold_until
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
