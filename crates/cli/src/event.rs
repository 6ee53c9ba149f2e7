// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classified event kinds published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SpawnRequested,
    SpawnAdmitted,
    SpawnStarted,
    SpawnSucceeded,
    SpawnFailed,
    SpawnCooldownEntered,
    SpawnCooldownExited,
    SchedulerPaused,
    SchedulerResumed,
    Backpressure,
    PaneOpened,
    PaneClosed,
    AgentState,
    StreamStarted,
    StreamStopped,
    SendDispatched,
    ReservationGranted,
    ReservationReleased,
    EnsembleStarted,
    EnsembleModeActive,
    EnsembleModeDone,
    EnsembleModeError,
    EnsembleStopped,
    EnsembleSynthesized,
}

impl EventKind {
    /// Dotted wire-format name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpawnRequested => "spawn.requested",
            Self::SpawnAdmitted => "spawn.admitted",
            Self::SpawnStarted => "spawn.started",
            Self::SpawnSucceeded => "spawn.succeeded",
            Self::SpawnFailed => "spawn.failed",
            Self::SpawnCooldownEntered => "spawn.cooldown_entered",
            Self::SpawnCooldownExited => "spawn.cooldown_exited",
            Self::SchedulerPaused => "scheduler.paused",
            Self::SchedulerResumed => "scheduler.resumed",
            Self::Backpressure => "scheduler.backpressure",
            Self::PaneOpened => "pane.opened",
            Self::PaneClosed => "pane.closed",
            Self::AgentState => "agent.state",
            Self::StreamStarted => "stream.started",
            Self::StreamStopped => "stream.stopped",
            Self::SendDispatched => "send.dispatched",
            Self::ReservationGranted => "reservation.granted",
            Self::ReservationReleased => "reservation.released",
            Self::EnsembleStarted => "ensemble.started",
            Self::EnsembleModeActive => "ensemble.mode_active",
            Self::EnsembleModeDone => "ensemble.mode_done",
            Self::EnsembleModeError => "ensemble.mode_error",
            Self::EnsembleStopped => "ensemble.stopped",
            Self::EnsembleSynthesized => "ensemble.synthesized",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bus event. Payloads are structured JSON so subscribers stay decoupled
/// from publisher types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with the current time.
    pub fn new(kind: EventKind, session: Option<&str>, payload: serde_json::Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            session: session.map(str::to_owned),
            payload,
        }
    }
}
