// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin, testable facade over the terminal multiplexer.
//!
//! Callers never shell out to tmux directly; everything goes through the
//! [`Mux`] trait so the whole control plane runs against [`FakeMux`] in
//! tests. Errors are classified — `Transient` is surfaced unmodified and
//! callers decide whether to retry.

mod tmux;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use tmux::TmuxMux;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, MuxCall};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::NtmError;

/// Classified multiplexer errors.
#[derive(Debug, Clone, Error)]
pub enum MuxError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("multiplexer unavailable: {0}")]
    Unavailable(String),
    #[error("denied: {0}")]
    Denied(String),
    #[error("transient: {0}")]
    Transient(String),
}

impl From<MuxError> for NtmError {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::NotFound(m) => NtmError::NotFound(m),
            MuxError::Unavailable(m) => NtmError::Unavailable(m),
            MuxError::Denied(m) => NtmError::Validation(m),
            MuxError::Transient(m) => NtmError::Transient(m),
        }
    }
}

/// Stable, opaque pane handle (tmux pane id, e.g. `%3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaneId(pub String);

impl std::fmt::Display for PaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pane as reported by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneInfo {
    pub id: PaneId,
    /// Session-local index.
    pub index: usize,
    pub title: String,
    /// Command line running in the pane, as far as the multiplexer knows.
    pub command: String,
}

/// A session as reported by the multiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub pane_count: usize,
}

/// Session and pane primitives the control plane needs from the
/// multiplexer. One implementation per backend; `FakeMux` for tests.
#[async_trait]
pub trait Mux: Send + Sync + 'static {
    async fn create_session(&self, name: &str, dir: &str) -> Result<(), MuxError>;

    async fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError>;

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError>;

    /// Split a new pane in `session` running `command` under `dir`.
    /// Returns the new pane.
    async fn split_pane(
        &self,
        session: &str,
        dir: &str,
        command: &str,
    ) -> Result<PaneInfo, MuxError>;

    /// Type `text` into the pane; `press_enter` appends a newline key.
    async fn send_keys(&self, pane: &PaneId, text: &str, press_enter: bool)
        -> Result<(), MuxError>;

    /// Deliver Ctrl-C to the pane's foreground process.
    async fn send_interrupt(&self, pane: &PaneId) -> Result<(), MuxError>;

    /// Capture the last `lines` lines of the pane's scrollback.
    async fn capture(&self, pane: &PaneId, lines: usize) -> Result<String, MuxError>;

    /// Mirror pane output to a FIFO at `path`.
    async fn pipe_to_fifo(&self, pane: &PaneId, path: &str) -> Result<(), MuxError>;

    /// Stop mirroring pane output.
    async fn stop_pipe(&self, pane: &PaneId) -> Result<(), MuxError>;

    async fn set_pane_title(&self, pane: &PaneId, title: &str) -> Result<(), MuxError>;

    /// Kill a single pane.
    async fn kill_pane(&self, pane: &PaneId) -> Result<(), MuxError>;
}

/// Escape a string for embedding inside shell double quotes.
pub fn shell_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' => out.push_str("\\$"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap an agent launch command so it starts in `dir`:
/// `cd "<dir>" && <command>`. The directory is escaped; the command is the
/// operator's own shell fragment and passes through unchanged.
pub fn wrap_launch_command(dir: &str, command: &str) -> String {
    format!("cd \"{}\" && {}", shell_escape(dir), command)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
