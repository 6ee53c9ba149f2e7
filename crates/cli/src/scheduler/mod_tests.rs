// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentType;
use crate::bus::EventBus;
use crate::config::{BackoffConfig, HeadroomConfig, SchedulerConfig};
use crate::error::ErrorKind;
use crate::event::EventKind;

use super::headroom::{HeadroomSnapshot, ResourceProbe};
use super::SpawnScheduler;

struct HealthyProbe;

impl ResourceProbe for HealthyProbe {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot> {
        Ok(HeadroomSnapshot {
            free_mem_mb: 8192,
            free_disk_mb: 100_000,
            load1: 0.1,
            open_fds: 32,
        })
    }
}

/// Probe whose snapshots are swapped at runtime.
struct SwappableProbe {
    current: Arc<Mutex<HeadroomSnapshot>>,
}

impl ResourceProbe for SwappableProbe {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot> {
        Ok(*self.current.lock())
    }
}

fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        rate_per_sec: 100.0,
        burst_size: 100.0,
        max_concurrent: 4,
        ramp_up_delay_ms: 0,
        cooldown_on_failure_ms: 10_000,
        recovery_successes: 3,
        max_concurrent_spawns: 8,
        max_spawns_per_sec: 100.0,
        global_burst_size: 100.0,
        check_interval_ms: 100,
        headroom: HeadroomConfig::default(),
        backoff: BackoffConfig {
            initial_delay_ms: 500,
            max_delay_ms: 4000,
            multiplier: 2.0,
            max_consecutive_failures: 2,
            global_pause_ms: 30_000,
        },
        backpressure_threshold: 2,
        default_retries: 0,
        retry_delay_ms: 0,
    }
}

fn scheduler(config: SchedulerConfig) -> (Arc<SpawnScheduler>, Arc<EventBus>) {
    let bus = EventBus::new(256);
    (SpawnScheduler::new(config, Arc::clone(&bus), Box::new(HealthyProbe)), bus)
}

#[tokio::test(start_paused = true)]
async fn per_type_concurrency_cap_holds() {
    let (sched, _bus) = scheduler(SchedulerConfig { max_concurrent: 2, ..test_config() });
    let cancel = CancellationToken::new();

    let p1 = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    let p2 = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    assert_eq!(sched.in_flight(), 2);

    // Third claude must wait while both slots are held.
    let blocked =
        tokio::time::timeout(Duration::from_secs(1), sched.admit(AgentType::Claude, &cancel))
            .await;
    assert!(blocked.is_err(), "third spawn should still be waiting");

    // Another type is unaffected by claude's cap.
    let other = sched.admit(AgentType::Codex, &cancel).await.unwrap();
    other.succeeded();

    p1.succeeded();
    p2.succeeded();
    let p3 = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    p3.succeeded();
}

#[tokio::test(start_paused = true)]
async fn global_concurrency_cap_holds() {
    let (sched, _bus) = scheduler(SchedulerConfig {
        max_concurrent: 8,
        max_concurrent_spawns: 3,
        ..test_config()
    });
    let cancel = CancellationToken::new();

    let permits = vec![
        sched.admit(AgentType::Claude, &cancel).await.unwrap(),
        sched.admit(AgentType::Codex, &cancel).await.unwrap(),
        sched.admit(AgentType::Gemini, &cancel).await.unwrap(),
    ];
    assert_eq!(sched.in_flight(), 3);

    let blocked =
        tokio::time::timeout(Duration::from_secs(1), sched.admit(AgentType::Aider, &cancel))
            .await;
    assert!(blocked.is_err());

    for p in permits {
        p.succeeded();
    }
    assert_eq!(sched.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn rate_cap_spaces_admissions() {
    let (sched, _bus) = scheduler(SchedulerConfig {
        rate_per_sec: 1.0,
        burst_size: 2.0,
        max_spawns_per_sec: 100.0,
        ..test_config()
    });
    let cancel = CancellationToken::new();
    let start = Instant::now();

    // Five sequential admissions at burst 2, rate 1/s: the last must wait
    // for three refills.
    for _ in 0..5 {
        let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
        permit.succeeded();
    }
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn backpressure_rejects_with_busy() {
    let (sched, bus) = scheduler(SchedulerConfig {
        max_concurrent: 1,
        backpressure_threshold: 2,
        ..test_config()
    });
    let cancel = CancellationToken::new();

    // Hold the only slot so later requests queue.
    let held = sched.admit(AgentType::Claude, &cancel).await.unwrap();

    let mut waiters = Vec::new();
    for _ in 0..2 {
        let sched = Arc::clone(&sched);
        let cancel = cancel.clone();
        waiters.push(tokio::spawn(async move {
            sched.admit(AgentType::Claude, &cancel).await
        }));
    }
    // Let the waiters enqueue.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = sched.admit(AgentType::Claude, &cancel).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
    assert!(bus
        .history(100)
        .iter()
        .any(|e| e.kind == EventKind::Backpressure));

    cancel.cancel();
    held.succeeded();
    for w in waiters {
        let _ = w.await;
    }
}

#[tokio::test(start_paused = true)]
async fn failure_enters_cooldown_and_blocks_admission() {
    let (sched, bus) = scheduler(test_config());
    let cancel = CancellationToken::new();

    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    permit.failed(false);

    assert!(bus
        .history(100)
        .iter()
        .any(|e| e.kind == EventKind::SpawnCooldownEntered));

    let start = Instant::now();
    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(10), "waited {waited:?}");
    assert!(bus
        .history(100)
        .iter()
        .any(|e| e.kind == EventKind::SpawnCooldownExited));
    permit.succeeded();
}

#[tokio::test(start_paused = true)]
async fn recovery_restricts_concurrency_until_successes() {
    let (sched, _bus) = scheduler(SchedulerConfig {
        cooldown_on_failure_ms: 100,
        recovery_successes: 2,
        ..test_config()
    });
    let cancel = CancellationToken::new();

    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    permit.failed(false);

    // Past cooldown, but recovering: one spawn at a time.
    let first = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    let blocked =
        tokio::time::timeout(Duration::from_secs(1), sched.admit(AgentType::Claude, &cancel))
            .await;
    assert!(blocked.is_err(), "recovering type must be serialized");
    first.succeeded();

    let second = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    second.succeeded();

    // Two successes recorded: normal concurrency is back.
    let a = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    let b = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    a.succeeded();
    b.succeeded();
}

#[tokio::test(start_paused = true)]
async fn headroom_breach_pauses_admission_until_clear() {
    let snapshot = Arc::new(Mutex::new(HeadroomSnapshot {
        free_mem_mb: 1, // breached
        free_disk_mb: 100_000,
        load1: 0.1,
        open_fds: 32,
    }));
    let bus = EventBus::new(64);
    let sched = SpawnScheduler::new(
        test_config(),
        Arc::clone(&bus),
        Box::new(SwappableProbe { current: Arc::clone(&snapshot) }),
    );
    let cancel = CancellationToken::new();

    let blocked =
        tokio::time::timeout(Duration::from_millis(300), sched.admit(AgentType::Claude, &cancel))
            .await;
    assert!(blocked.is_err(), "breached headroom must hold admission");

    snapshot.lock().free_mem_mb = 8192;
    // Next sample (check_interval = 100ms) clears the breach.
    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    permit.succeeded();
}

#[tokio::test(start_paused = true)]
async fn resource_failures_trip_global_pause_and_drain_buckets() {
    let (sched, bus) = scheduler(test_config());
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
        permit.failed(true);
    }
    assert!(bus
        .history(100)
        .iter()
        .any(|e| e.kind == EventKind::SchedulerPaused));

    // Admission resumes only after the pause (30s) plus bucket refill and
    // re-warmup; cooldown (10s) is concurrent with the pause.
    let start = Instant::now();
    let permit = sched.admit(AgentType::Codex, &cancel).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(30), "waited {waited:?}");
    assert!(bus
        .history(200)
        .iter()
        .any(|e| e.kind == EventKind::SchedulerResumed));
    permit.succeeded();
}

#[tokio::test(start_paused = true)]
async fn cold_start_waits_out_warmup() {
    let (sched, _bus) = scheduler(SchedulerConfig {
        ramp_up_delay_ms: 2000,
        ..test_config()
    });
    let cancel = CancellationToken::new();

    let start = Instant::now();
    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(2), "waited {waited:?}");
    permit.succeeded();

    // Warm now: immediate admission.
    let start = Instant::now();
    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    permit.succeeded();
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_admission() {
    let (sched, _bus) = scheduler(SchedulerConfig { max_concurrent: 1, ..test_config() });
    let cancel = CancellationToken::new();

    let held = sched.admit(AgentType::Claude, &cancel).await.unwrap();

    let waiter_cancel = cancel.clone();
    let waiter = {
        let sched = Arc::clone(&sched);
        tokio::spawn(async move { sched.admit(AgentType::Claude, &waiter_cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = waiter.await.unwrap();
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Transient);
    held.succeeded();
}

#[tokio::test(start_paused = true)]
async fn dropping_a_permit_releases_the_slot() {
    let (sched, _bus) = scheduler(SchedulerConfig { max_concurrent: 1, ..test_config() });
    let cancel = CancellationToken::new();

    {
        let _permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
        assert_eq!(sched.in_flight(), 1);
    }
    assert_eq!(sched.in_flight(), 0);

    // Dropped-as-cancelled must not enter cooldown.
    let start = Instant::now();
    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
    permit.succeeded();
}

#[tokio::test(start_paused = true)]
async fn spawn_events_are_published_in_lifecycle_order() {
    let (sched, bus) = scheduler(test_config());
    let cancel = CancellationToken::new();

    let permit = sched.admit(AgentType::Claude, &cancel).await.unwrap();
    permit.succeeded();

    let kinds: Vec<EventKind> = bus.history(10).iter().map(|e| e.kind).collect();
    let requested = kinds.iter().position(|k| *k == EventKind::SpawnRequested);
    let admitted = kinds.iter().position(|k| *k == EventKind::SpawnAdmitted);
    let succeeded = kinds.iter().position(|k| *k == EventKind::SpawnSucceeded);
    assert!(requested < admitted && admitted < succeeded);
}
