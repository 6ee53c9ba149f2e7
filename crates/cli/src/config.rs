// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration.
//!
//! Loaded from `~/.ntm/config.toml` when present; every field has a default
//! so a missing file yields a fully working config. Durations are stored as
//! milliseconds in the file and exposed as [`Duration`] accessors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AgentType;

/// Resolve the ntm state directory (`$NTM_STATE_DIR` or `~/.ntm`).
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NTM_STATE_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_default();
    PathBuf::from(home).join(".ntm")
}

/// Directory for transient pane stream FIFOs.
pub fn stream_dir() -> PathBuf {
    PathBuf::from("/tmp/ntm_pane_streams")
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-agent launch command overrides (`claude = "claude --model opus"`).
    pub agents: BTreeMap<String, String>,
    /// Base prompt prepended to every send (lowest priority source).
    pub base_prompt: Option<String>,
    /// File whose contents serve as the base prompt.
    pub base_prompt_file: Option<PathBuf>,
    /// Shell command run after each send, with `NTM_*` variables injected.
    pub post_send_hook: Option<String>,
    /// Prefer the single best-fitting pane when no explicit panes are named.
    pub smart_routing: bool,
    /// Redaction mode on the send path: off, warn, redact, block.
    pub redaction: RedactionConfig,
    pub parser: ParserConfig,
    pub stream: StreamConfig,
    pub scheduler: SchedulerConfig,
    pub history: HistoryConfig,
    pub ensemble: EnsembleConfig,
    /// Event bus ring-history capacity.
    pub bus_history: Option<usize>,
}

impl Config {
    /// Load configuration from the given file, falling back to defaults when
    /// the file does not exist. A present-but-malformed file is an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from the default location (`~/.ntm/config.toml`).
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&state_dir().join("config.toml"))
    }

    /// Resolve the launch command for an agent type: config override first,
    /// then the built-in default.
    pub fn agent_command(&self, agent: AgentType) -> Option<String> {
        if let Some(cmd) = self.agents.get(agent.as_str()) {
            return Some(cmd.clone());
        }
        agent.default_command().map(str::to_owned)
    }

    pub fn bus_history_capacity(&self) -> usize {
        self.bus_history.unwrap_or(1024)
    }
}

/// Redaction policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub mode: crate::redact::RedactionMode,
}

/// Output parser knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Trailing sample size captured into each parse result, in bytes.
    pub sample_length: usize,
    /// Number of trailing lines the idle classifier inspects.
    pub idle_window_lines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { sample_length: 500, idle_window_lines: 5 }
    }
}

/// Pane streamer knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_lines_per_event: usize,
    pub flush_interval_ms: u64,
    pub fallback_poll_lines: usize,
    pub fallback_poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_lines_per_event: 64,
            flush_interval_ms: 250,
            fallback_poll_lines: 200,
            fallback_poll_interval_ms: 1000,
        }
    }
}

impl StreamConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn fallback_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_interval_ms)
    }
}

/// Spawn scheduler knobs (per-type defaults plus global caps).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Per-type token refill rate.
    pub rate_per_sec: f64,
    /// Per-type bucket capacity.
    pub burst_size: f64,
    /// Per-type concurrent spawn cap.
    pub max_concurrent: usize,
    /// Warmup gate after cold start or global pause.
    pub ramp_up_delay_ms: u64,
    /// Admission block after a failed spawn.
    pub cooldown_on_failure_ms: u64,
    /// Consecutive successes needed to restore normal rate after cooldown.
    pub recovery_successes: u32,

    /// Combined concurrent spawn cap across all types.
    pub max_concurrent_spawns: usize,
    /// Combined token refill rate.
    pub max_spawns_per_sec: f64,
    /// Combined bucket capacity.
    pub global_burst_size: f64,

    /// Headroom sampling interval.
    pub check_interval_ms: u64,
    pub headroom: HeadroomConfig,
    pub backoff: BackoffConfig,

    /// Queue length above which new enqueues are rejected with `Busy`.
    pub backpressure_threshold: usize,
    /// Retry budget for a failed spawn.
    pub default_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 0.5,
            burst_size: 2.0,
            max_concurrent: 4,
            ramp_up_delay_ms: 2000,
            cooldown_on_failure_ms: 10_000,
            recovery_successes: 3,
            max_concurrent_spawns: 8,
            max_spawns_per_sec: 1.0,
            global_burst_size: 4.0,
            check_interval_ms: 5000,
            headroom: HeadroomConfig::default(),
            backoff: BackoffConfig::default(),
            backpressure_threshold: 32,
            default_retries: 2,
            retry_delay_ms: 3000,
        }
    }
}

impl SchedulerConfig {
    pub fn ramp_up_delay(&self) -> Duration {
        Duration::from_millis(self.ramp_up_delay_ms)
    }

    pub fn cooldown_on_failure(&self) -> Duration {
        Duration::from_millis(self.cooldown_on_failure_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Resource envelopes gating admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadroomConfig {
    pub min_free_mem_mb: u64,
    pub min_free_disk_mb: u64,
    pub max_load1: f64,
    pub max_open_fds: u64,
}

impl Default for HeadroomConfig {
    fn default() -> Self {
        Self {
            min_free_mem_mb: 512,
            min_free_disk_mb: 1024,
            max_load1: 8.0,
            max_open_fds: 512,
        }
    }
}

/// Exponential backoff on classified resource errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub max_consecutive_failures: u32,
    pub global_pause_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            max_consecutive_failures: 5,
            global_pause_ms: 120_000,
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn global_pause(&self) -> Duration {
        Duration::from_millis(self.global_pause_ms)
    }
}

/// History retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Entries older than this many hours are dropped on append.
    pub retention_hours: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { retention_hours: 24 * 30 }
    }
}

/// Ensemble coordinator defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub mode_timeout_ms: u64,
    pub mode_retries: u32,
    pub max_findings: usize,
    pub min_confidence: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            mode_timeout_ms: 15 * 60 * 1000,
            mode_retries: 1,
            max_findings: 50,
            min_confidence: 0.2,
        }
    }
}

impl EnsembleConfig {
    pub fn mode_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_timeout_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
