// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn admission control.
//!
//! Spawning is the only operation that introduces new uncontrolled resource
//! pressure, so every spawn passes through this gate. Admission requires,
//! in order: free semaphore slots (global and per-type), tokens in both
//! rate buckets, headroom, no cooldown or global pause, and an elapsed
//! warmup. A request that cannot pass *waits* — it never fails admission —
//! except when the per-type queue is over the backpressure threshold, which
//! rejects new enqueues with a classified `Busy` error.
//!
//! Lock order: the single scheduler mutex is leaf-level; bus publishes
//! happen outside it.

pub mod backoff;
pub mod bucket;
pub mod headroom;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::AgentType;
use crate::bus::EventBus;
use crate::config::SchedulerConfig;
use crate::error::{NtmError, Result};
use crate::event::{Event, EventKind};

use backoff::{BackoffAction, BackoffController};
use bucket::TokenBucket;
use headroom::{HeadroomChecker, HeadroomStatus, ResourceProbe};

/// A request to spawn one agent pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub agent: AgentType,
    pub session: String,
    pub working_dir: String,
    pub command: String,
    /// Retry budget; each retry re-enters admission.
    pub retries: u32,
    /// Optional delay before the first attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
}

struct TypeState {
    bucket: TokenBucket,
    in_flight: usize,
    queued: usize,
    cooldown_until: Option<Instant>,
    /// Successes still needed before normal rate is restored. While
    /// non-zero the type is restricted to one spawn at a time.
    recovery_remaining: u32,
    warmup_until: Option<Instant>,
}

impl TypeState {
    fn new(config: &SchedulerConfig, now: Instant) -> Self {
        Self {
            bucket: TokenBucket::new(config.rate_per_sec, config.burst_size, now),
            in_flight: 0,
            queued: 0,
            cooldown_until: None,
            recovery_remaining: 0,
            // Cold start: the first admission waits out the ramp-up delay.
            warmup_until: Some(now + config.ramp_up_delay()),
        }
    }
}

struct SchedState {
    types: BTreeMap<AgentType, TypeState>,
    global_bucket: TokenBucket,
    global_in_flight: usize,
    headroom: HeadroomChecker,
    backoff: BackoffController,
    paused_until: Option<Instant>,
}

/// The spawn scheduler. One per runtime; shared via `Arc`.
pub struct SpawnScheduler {
    config: SchedulerConfig,
    bus: Arc<EventBus>,
    state: Mutex<SchedState>,
    notify: Notify,
}

/// Why admission is currently impossible, with a wait hint.
enum Hold {
    Semaphore,
    Bucket(Duration),
    Headroom,
    Cooldown(Instant),
    Paused(Instant),
    Warmup(Instant),
}

impl SpawnScheduler {
    pub fn new(
        config: SchedulerConfig,
        bus: Arc<EventBus>,
        probe: Box<dyn ResourceProbe>,
    ) -> Arc<Self> {
        let now = Instant::now();
        let headroom =
            HeadroomChecker::new(probe, config.headroom.clone(), config.check_interval());
        Arc::new(Self {
            state: Mutex::new(SchedState {
                types: BTreeMap::new(),
                global_bucket: TokenBucket::new(
                    config.max_spawns_per_sec,
                    config.global_burst_size,
                    now,
                ),
                global_in_flight: 0,
                headroom,
                backoff: BackoffController::new(config.backoff.clone()),
                paused_until: None,
            }),
            config,
            bus,
            notify: Notify::new(),
        })
    }

    /// Wait for admission of one spawn of the given agent type.
    ///
    /// Returns a permit whose `succeeded`/`failed` methods report the
    /// attempt outcome back; dropping the permit releases the slot.
    pub async fn admit(
        self: &Arc<Self>,
        agent: AgentType,
        cancel: &CancellationToken,
    ) -> Result<SpawnPermit> {
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            let entry = state
                .types
                .entry(agent)
                .or_insert_with(|| TypeState::new(&self.config, now));
            if entry.queued >= self.config.backpressure_threshold {
                drop(state);
                self.publish(EventKind::Backpressure, agent, serde_json::json!({}));
                return Err(NtmError::Busy(format!(
                    "spawn queue for {agent} exceeds {} waiting requests",
                    self.config.backpressure_threshold
                )));
            }
            entry.queued += 1;
        }
        self.publish(EventKind::SpawnRequested, agent, serde_json::json!({}));

        let result = self.wait_for_slot(agent, cancel).await;

        {
            let mut state = self.state.lock();
            if let Some(entry) = state.types.get_mut(&agent) {
                entry.queued = entry.queued.saturating_sub(1);
            }
        }
        result
    }

    async fn wait_for_slot(
        self: &Arc<Self>,
        agent: AgentType,
        cancel: &CancellationToken,
    ) -> Result<SpawnPermit> {
        loop {
            if cancel.is_cancelled() {
                return Err(NtmError::Transient("admission cancelled".into()));
            }
            let (hold, transitions) = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let transitions = self.collect_transitions(&mut state, now);
                (self.try_admit(&mut state, agent, now), transitions)
            };
            for (kind, subject) in transitions {
                match subject {
                    Some(agent) => self.publish(kind, agent, serde_json::json!({})),
                    None => self.bus.publish_sync(Event::new(kind, None, serde_json::json!({}))),
                }
            }
            match hold {
                None => {
                    self.publish(EventKind::SpawnAdmitted, agent, serde_json::json!({}));
                    return Ok(SpawnPermit {
                        scheduler: Arc::clone(self),
                        agent,
                        done: false,
                    });
                }
                Some(hold) => {
                    let wait = hold_duration(&hold).clamp(
                        Duration::from_millis(5),
                        Duration::from_millis(100),
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(NtmError::Transient("admission cancelled".into()));
                        }
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Record pause/cooldown expiries, returning the events to publish
    /// after the state lock is released.
    fn collect_transitions(
        &self,
        state: &mut SchedState,
        now: Instant,
    ) -> Vec<(EventKind, Option<AgentType>)> {
        let mut out = Vec::new();
        if state.paused_until.is_some_and(|until| now >= until) {
            state.paused_until = None;
            // Every type restarts through warmup after a global pause.
            for entry in state.types.values_mut() {
                entry.warmup_until = Some(now + self.config.ramp_up_delay());
            }
            info!("scheduler resumed after global pause");
            out.push((EventKind::SchedulerResumed, None));
        }
        for (agent, entry) in state.types.iter_mut() {
            if entry.cooldown_until.is_some_and(|until| now >= until) {
                entry.cooldown_until = None;
                out.push((EventKind::SpawnCooldownExited, Some(*agent)));
            }
        }
        out
    }

    /// The admission check, in contractual order. `None` means admitted —
    /// tokens taken and slots held.
    fn try_admit(&self, state: &mut SchedState, agent: AgentType, now: Instant) -> Option<Hold> {
        let max_global = self.config.max_concurrent_spawns;
        let max_type = self.config.max_concurrent;

        // (1) semaphores
        if state.global_in_flight >= max_global {
            return Some(Hold::Semaphore);
        }
        {
            let entry = state
                .types
                .entry(agent)
                .or_insert_with(|| TypeState::new(&self.config, now));
            let effective_cap = if entry.recovery_remaining > 0 { 1 } else { max_type };
            if entry.in_flight >= effective_cap {
                return Some(Hold::Semaphore);
            }
        }

        // (2) token buckets (checked, taken only after all gates pass)
        let global_wait = state.global_bucket.time_until_token(now);
        if global_wait > Duration::ZERO {
            return Some(Hold::Bucket(global_wait));
        }
        {
            let entry = state
                .types
                .entry(agent)
                .or_insert_with(|| TypeState::new(&self.config, now));
            let wait = entry.bucket.time_until_token(now);
            if wait > Duration::ZERO {
                return Some(Hold::Bucket(wait));
            }
        }

        // (3) headroom
        if let HeadroomStatus::Breached(reasons) = state.headroom.status(now) {
            debug!(?reasons, "admission held: headroom breached");
            return Some(Hold::Headroom);
        }

        // (4) cooldown / global pause / backoff hold
        if let Some(until) = state.paused_until {
            return Some(Hold::Paused(until));
        }
        if state.backoff.holding(now) {
            if let Some(until) = state.backoff.hold_until() {
                return Some(Hold::Paused(until));
            }
        }
        if let Some(until) =
            state.types.get(&agent).and_then(|entry| entry.cooldown_until)
        {
            return Some(Hold::Cooldown(until));
        }

        // (5) warmup
        if let Some(until) = state.types.get(&agent).and_then(|e| e.warmup_until) {
            if now < until {
                return Some(Hold::Warmup(until));
            }
        }

        // Admitted: take tokens and hold slots.
        state.global_bucket.try_take(now);
        state.global_in_flight += 1;
        if let Some(entry) = state.types.get_mut(&agent) {
            entry.bucket.try_take(now);
            entry.in_flight += 1;
            entry.warmup_until = None;
        }
        None
    }

    /// Record a successful spawn. The slot stays held — it is released when
    /// the pane closes.
    fn finish_success(&self, agent: AgentType) {
        {
            let mut state = self.state.lock();
            if let Some(entry) = state.types.get_mut(&agent) {
                entry.recovery_remaining = entry.recovery_remaining.saturating_sub(1);
            }
            state.backoff.on_success();
        }
        self.publish(EventKind::SpawnSucceeded, agent, serde_json::json!({}));
        // Recovery restrictions may have lifted.
        self.notify.notify_waiters();
    }

    /// Record a failed spawn attempt: slot released, type enters cooldown,
    /// resource errors feed the backoff controller.
    fn finish_failure(&self, agent: AgentType, resource: bool) {
        let mut pause_entered = false;
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.global_in_flight = state.global_in_flight.saturating_sub(1);
            if let Some(entry) = state.types.get_mut(&agent) {
                entry.in_flight = entry.in_flight.saturating_sub(1);
                entry.cooldown_until = Some(now + self.config.cooldown_on_failure());
                entry.recovery_remaining = self.config.recovery_successes;
            }
            if resource {
                if let BackoffAction::GlobalPause(until) = state.backoff.on_resource_error(now)
                {
                    state.paused_until = Some(until);
                    state.global_bucket.drain(now);
                    for entry in state.types.values_mut() {
                        entry.bucket.drain(now);
                    }
                    pause_entered = true;
                }
            }
        }

        self.publish(EventKind::SpawnFailed, agent, serde_json::json!({}));
        self.publish(
            EventKind::SpawnCooldownEntered,
            agent,
            serde_json::json!({ "cooldown_ms": self.config.cooldown_on_failure_ms }),
        );
        if pause_entered {
            warn!("scheduler entered global pause");
            self.bus.publish_sync(Event::new(
                EventKind::SchedulerPaused,
                None,
                serde_json::json!({ "pause_ms": self.config.backoff.global_pause_ms }),
            ));
        }
        self.notify.notify_waiters();
    }

    /// Release one held slot (cancelled attempt or closed pane).
    fn release_one(&self, agent: AgentType) {
        {
            let mut state = self.state.lock();
            state.global_in_flight = state.global_in_flight.saturating_sub(1);
            if let Some(entry) = state.types.get_mut(&agent) {
                entry.in_flight = entry.in_flight.saturating_sub(1);
            }
        }
        self.notify.notify_waiters();
    }

    /// Release many slots with a single state pass and a single waiter
    /// wake-up, so a mass pane close does not stampede re-admission.
    pub fn release_batch(&self, slots: Vec<SpawnSlot>) {
        {
            let mut state = self.state.lock();
            for slot in &slots {
                state.global_in_flight = state.global_in_flight.saturating_sub(1);
                if let Some(entry) = state.types.get_mut(&slot.agent) {
                    entry.in_flight = entry.in_flight.saturating_sub(1);
                }
            }
        }
        for mut slot in slots {
            slot.released = true;
        }
        self.notify.notify_waiters();
    }

    /// Current number of in-flight spawns (global).
    pub fn in_flight(&self) -> usize {
        self.state.lock().global_in_flight
    }

    /// Record a classified resource error observed outside a permit (e.g. a
    /// host-level rate limit reported by the multiplexer).
    pub fn report_resource_error(&self) {
        let mut pause = false;
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            if let BackoffAction::GlobalPause(until) = state.backoff.on_resource_error(now) {
                state.paused_until = Some(until);
                state.global_bucket.drain(now);
                for entry in state.types.values_mut() {
                    entry.bucket.drain(now);
                }
                pause = true;
            }
        }
        if pause {
            self.bus.publish_sync(Event::new(
                EventKind::SchedulerPaused,
                None,
                serde_json::json!({ "pause_ms": self.config.backoff.global_pause_ms }),
            ));
        }
    }

    fn publish(&self, kind: EventKind, agent: AgentType, mut payload: serde_json::Value) {
        if let Some(map) = payload.as_object_mut() {
            map.insert("agent".to_owned(), serde_json::json!(agent.as_str()));
        }
        self.bus.publish_sync(Event::new(kind, None, payload));
    }
}

fn hold_duration(hold: &Hold) -> Duration {
    match hold {
        Hold::Semaphore | Hold::Headroom => Duration::from_millis(50),
        Hold::Bucket(wait) => *wait,
        Hold::Cooldown(until) | Hold::Paused(until) | Hold::Warmup(until) => {
            until.saturating_duration_since(Instant::now())
        }
    }
}

/// An admission grant. Report the outcome with [`SpawnPermit::succeeded`] or
/// [`SpawnPermit::failed`]; dropping without reporting releases the slot as
/// cancelled.
pub struct SpawnPermit {
    scheduler: Arc<SpawnScheduler>,
    agent: AgentType,
    done: bool,
}

impl std::fmt::Debug for SpawnPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnPermit")
            .field("agent", &self.agent)
            .field("done", &self.done)
            .finish()
    }
}

impl SpawnPermit {
    pub fn agent(&self) -> AgentType {
        self.agent
    }

    /// Report a successful spawn. The returned [`SpawnSlot`] keeps the
    /// semaphore slot held until the pane closes.
    pub fn succeeded(mut self) -> SpawnSlot {
        self.done = true;
        let scheduler = Arc::clone(&self.scheduler);
        scheduler.finish_success(self.agent);
        SpawnSlot {
            scheduler,
            agent: self.agent,
            released: false,
        }
    }

    /// Report a failed attempt; `resource` marks classified resource errors
    /// that must feed the backoff controller.
    pub fn failed(mut self, resource: bool) {
        self.done = true;
        self.scheduler.finish_failure(self.agent, resource);
    }
}

impl Drop for SpawnPermit {
    fn drop(&mut self) {
        if !self.done {
            self.scheduler.release_one(self.agent);
        }
    }
}

/// A held concurrency slot for a running pane. Dropping releases it; use
/// [`SpawnScheduler::release_batch`] when many panes close at once.
pub struct SpawnSlot {
    scheduler: Arc<SpawnScheduler>,
    agent: AgentType,
    released: bool,
}

impl SpawnSlot {
    pub fn agent(&self) -> AgentType {
        self.agent
    }
}

impl Drop for SpawnSlot {
    fn drop(&mut self) {
        if !self.released {
            self.scheduler.release_one(self.agent);
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
