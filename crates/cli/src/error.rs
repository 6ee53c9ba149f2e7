// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified error kinds shared across the control plane.
///
/// Each kind maps to a recovery policy: `Transient` errors are retried by
/// the spawn scheduler, `Unavailable` triggers streamer fallback, everything
/// else bubbles to the CLI handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unavailable,
    Transient,
    BlockedBySecret,
    PreflightBlocked,
    Reservation,
    Busy,
    Fatal,
}

impl ErrorKind {
    /// Wire-format string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::Transient => "transient",
            Self::BlockedBySecret => "blocked_by_secret",
            Self::PreflightBlocked => "preflight_blocked",
            Self::Reservation => "reservation",
            Self::Busy => "busy",
            Self::Fatal => "fatal",
        }
    }

    /// Process exit code for this kind when it reaches the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PreflightBlocked => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the orchestrator.
#[derive(Debug, Error)]
pub enum NtmError {
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("transient: {0}")]
    Transient(String),

    /// Redaction in `block` mode found secrets. Carries the category summary
    /// only — never the matched bytes.
    #[error("send blocked: secrets detected ({})", format_summary(.summary))]
    BlockedBySecret { summary: Vec<(String, usize)> },

    #[error("preflight blocked: {0} error finding(s)")]
    PreflightBlocked(usize),

    #[error("reservation conflict: {0}")]
    Reservation(String),

    /// Scheduler backpressure: the per-type queue is over threshold.
    #[error("scheduler busy: {0}")]
    Busy(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl NtmError {
    /// Classify this error into its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Transient(_) => ErrorKind::Transient,
            Self::BlockedBySecret { .. } => ErrorKind::BlockedBySecret,
            Self::PreflightBlocked(_) => ErrorKind::PreflightBlocked,
            Self::Reservation(_) => ErrorKind::Reservation,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    /// Whether the spawn scheduler may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Unavailable(_))
    }

    /// Machine payload for `--json` error output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.kind().as_str(),
        })
    }
}

fn format_summary(summary: &[(String, usize)]) -> String {
    summary.iter().map(|(cat, n)| format!("{cat}={n}")).collect::<Vec<_>>().join(", ")
}

pub type Result<T> = std::result::Result<T, NtmError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
