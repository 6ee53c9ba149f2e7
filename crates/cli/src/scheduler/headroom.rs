// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource headroom gate.
//!
//! Admission pauses while any sampled resource is outside its configured
//! envelope. Sampling is rate-limited to `check_interval`; between samples
//! the cached verdict holds, so a breach blocks until the next clear check.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::HeadroomConfig;

/// One sample of free system resources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadroomSnapshot {
    pub free_mem_mb: u64,
    pub free_disk_mb: u64,
    pub load1: f64,
    pub open_fds: u64,
}

/// Source of headroom samples. The production probe reads `/proc` and
/// statvfs; tests script snapshots.
pub trait ResourceProbe: Send + Sync + 'static {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot>;
}

/// `/proc`-based probe for Linux hosts.
pub struct ProcProbe {
    /// Filesystem whose free space is measured (the project volume).
    pub disk_path: PathBuf,
}

impl ProcProbe {
    pub fn new(disk_path: impl Into<PathBuf>) -> Self {
        Self { disk_path: disk_path.into() }
    }
}

impl ResourceProbe for ProcProbe {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot> {
        let meminfo = std::fs::read_to_string("/proc/meminfo")?;
        let free_mem_mb = parse_meminfo_available_mb(&meminfo)
            .ok_or_else(|| anyhow::anyhow!("MemAvailable missing from /proc/meminfo"))?;

        let loadavg = std::fs::read_to_string("/proc/loadavg")?;
        let load1 = loadavg
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("malformed /proc/loadavg"))?;

        let open_fds = std::fs::read_dir("/proc/self/fd")?.count() as u64;

        let stat = nix::sys::statvfs::statvfs(&self.disk_path)?;
        let free_disk_mb =
            (stat.blocks_available() as u64).saturating_mul(stat.fragment_size() as u64)
                / (1024 * 1024);

        Ok(HeadroomSnapshot { free_mem_mb, free_disk_mb, load1, open_fds })
    }
}

/// Extract `MemAvailable` from /proc/meminfo contents, in megabytes.
fn parse_meminfo_available_mb(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}

/// Verdict of a headroom check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadroomStatus {
    Ok,
    /// Names of the breached envelopes.
    Breached(Vec<String>),
}

impl HeadroomStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Caches probe samples and evaluates them against the envelopes.
pub struct HeadroomChecker {
    probe: Box<dyn ResourceProbe>,
    config: HeadroomConfig,
    check_interval: Duration,
    last_check: Option<Instant>,
    last_status: HeadroomStatus,
}

impl HeadroomChecker {
    pub fn new(
        probe: Box<dyn ResourceProbe>,
        config: HeadroomConfig,
        check_interval: Duration,
    ) -> Self {
        Self {
            probe,
            config,
            check_interval,
            last_check: None,
            last_status: HeadroomStatus::Ok,
        }
    }

    /// Current verdict, resampling at most once per `check_interval`.
    ///
    /// A probe failure keeps the previous verdict — a broken probe must not
    /// wedge admission shut.
    pub fn status(&mut self, now: Instant) -> HeadroomStatus {
        let due = self
            .last_check
            .is_none_or(|at| now.saturating_duration_since(at) >= self.check_interval);
        if due {
            self.last_check = Some(now);
            match self.probe.sample() {
                Ok(snapshot) => self.last_status = self.evaluate(&snapshot),
                Err(e) => tracing::warn!(error = %e, "headroom probe failed"),
            }
        }
        self.last_status.clone()
    }

    fn evaluate(&self, s: &HeadroomSnapshot) -> HeadroomStatus {
        let mut breached = Vec::new();
        if s.free_mem_mb < self.config.min_free_mem_mb {
            breached.push("free_mem".to_owned());
        }
        if s.free_disk_mb < self.config.min_free_disk_mb {
            breached.push("free_disk".to_owned());
        }
        if s.load1 > self.config.max_load1 {
            breached.push("load1".to_owned());
        }
        if s.open_fds > self.config.max_open_fds {
            breached.push("open_fds".to_owned());
        }
        if breached.is_empty() {
            HeadroomStatus::Ok
        } else {
            HeadroomStatus::Breached(breached)
        }
    }
}

#[cfg(test)]
#[path = "headroom_tests.rs"]
mod tests;
