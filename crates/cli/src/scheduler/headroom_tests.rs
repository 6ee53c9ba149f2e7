// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::HeadroomConfig;

use super::{
    parse_meminfo_available_mb, HeadroomChecker, HeadroomSnapshot, HeadroomStatus,
    ResourceProbe,
};

/// Probe returning a scripted sequence of snapshots.
struct ScriptedProbe {
    snapshots: Mutex<Vec<anyhow::Result<HeadroomSnapshot>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    fn new(snapshots: Vec<anyhow::Result<HeadroomSnapshot>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                snapshots: Mutex::new(snapshots.into_iter().rev().collect()),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl ResourceProbe for ScriptedProbe {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots
            .lock()
            .pop()
            .unwrap_or(Ok(healthy()))
    }
}

fn healthy() -> HeadroomSnapshot {
    HeadroomSnapshot { free_mem_mb: 4096, free_disk_mb: 50_000, load1: 0.5, open_fds: 64 }
}

fn checker(
    snapshots: Vec<anyhow::Result<HeadroomSnapshot>>,
) -> (HeadroomChecker, Arc<AtomicUsize>) {
    let (probe, calls) = ScriptedProbe::new(snapshots);
    (
        HeadroomChecker::new(
            Box::new(probe),
            HeadroomConfig::default(),
            Duration::from_secs(5),
        ),
        calls,
    )
}

#[tokio::test(start_paused = true)]
async fn healthy_sample_passes() {
    let (mut checker, _) = checker(vec![Ok(healthy())]);
    assert_eq!(checker.status(Instant::now()), HeadroomStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn breach_names_every_violated_envelope() {
    let (mut checker, _) = checker(vec![Ok(HeadroomSnapshot {
        free_mem_mb: 10,
        free_disk_mb: 10,
        load1: 99.0,
        open_fds: 100_000,
    })]);
    assert_eq!(
        checker.status(Instant::now()),
        HeadroomStatus::Breached(vec![
            "free_mem".to_owned(),
            "free_disk".to_owned(),
            "load1".to_owned(),
            "open_fds".to_owned(),
        ])
    );
}

#[tokio::test(start_paused = true)]
async fn verdict_is_cached_between_intervals() {
    let (mut checker, calls) = checker(vec![
        Ok(HeadroomSnapshot { free_mem_mb: 10, ..healthy() }),
        Ok(healthy()),
    ]);
    let start = Instant::now();

    assert!(!checker.status(start).is_ok());
    // Within the interval: cached breach, no new probe call.
    assert!(!checker.status(start + Duration::from_secs(2)).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Next interval: fresh healthy sample clears the breach.
    assert!(checker.status(start + Duration::from_secs(6)).is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn probe_failure_keeps_previous_verdict() {
    let (mut checker, _) = checker(vec![Ok(healthy()), Err(anyhow::anyhow!("proc vanished"))]);
    let start = Instant::now();
    assert!(checker.status(start).is_ok());
    assert!(checker.status(start + Duration::from_secs(6)).is_ok());
}

#[test]
fn meminfo_parsing() {
    let meminfo = "MemTotal:       16000000 kB\nMemFree:        1000000 kB\nMemAvailable:   2048000 kB\n";
    assert_eq!(parse_meminfo_available_mb(meminfo), Some(2000));
    assert_eq!(parse_meminfo_available_mb("MemTotal: 1 kB\n"), None);
}
