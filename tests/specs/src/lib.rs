// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the workspace scenario tests.

use std::sync::Arc;

use ntm::config::Config;
use ntm::mux::FakeMux;
use ntm::runtime::Runtime;
use ntm::scheduler::headroom::{HeadroomSnapshot, ResourceProbe};

/// Probe that always reports generous headroom.
pub struct HealthyProbe;

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

/// A runtime wired to a fake multiplexer with test-friendly scheduling.
pub struct SpecHarness {
    pub mux: Arc<FakeMux>,
    pub runtime: Runtime,
    /// Keeps `NTM_STATE_DIR` alive for the harness lifetime.
    pub state_dir: tempfile::TempDir,
}

impl SpecHarness {
    /// Build a harness. Callers must hold the `serial_test` lock since the
    /// state directory is configured through the environment.
    pub fn new() -> anyhow::Result<Self> {
        let state_dir = tempfile::tempdir()?;
        std::env::set_var("NTM_STATE_DIR", state_dir.path());

        let mut config = Config::default();
        config.scheduler.ramp_up_delay_ms = 0;
        config.scheduler.rate_per_sec = 1000.0;
        config.scheduler.burst_size = 1000.0;
        config.scheduler.max_spawns_per_sec = 1000.0;
        config.scheduler.global_burst_size = 1000.0;
        config.scheduler.max_concurrent = 16;
        config.scheduler.max_concurrent_spawns = 32;
        config.stream.fallback_poll_interval_ms = 20;
        config.stream.flush_interval_ms = 20;

        let mux = Arc::new(FakeMux::new());
        mux.set_pipe_unsupported(true);
        let runtime =
            Runtime::new(config, Arc::clone(&mux) as _, Box::new(HealthyProbe));
        Ok(Self { mux, runtime, state_dir })
    }
}
