// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording fake multiplexer for tests.
//!
//! Sessions and panes live in memory; `send_keys` appends to a per-pane
//! transcript which `capture` plays back, so higher layers can assert on
//! exactly what reached each pane. Captures can also be scripted per pane
//! to feed the output parser.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Mux, MuxError, PaneId, PaneInfo, SessionInfo};

/// One recorded facade call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    CreateSession { name: String, dir: String },
    KillSession { name: String },
    SplitPane { session: String, dir: String, command: String },
    SendKeys { pane: PaneId, text: String, press_enter: bool },
    SendInterrupt { pane: PaneId },
    Capture { pane: PaneId, lines: usize },
    PipeToFifo { pane: PaneId, path: String },
    StopPipe { pane: PaneId },
    SetPaneTitle { pane: PaneId, title: String },
    KillPane { pane: PaneId },
}

#[derive(Debug, Default)]
struct FakePane {
    session: String,
    index: usize,
    title: String,
    command: String,
    /// Text delivered via send_keys, in order.
    transcript: Vec<String>,
    /// Scripted capture output; when set it wins over the transcript.
    scripted_capture: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    sessions: BTreeMap<String, String>,
    panes: BTreeMap<PaneId, FakePane>,
    calls: Vec<MuxCall>,
    next_pane: usize,
    /// When set, pipe_to_fifo fails with `Unavailable` (exercises fallback).
    pipe_unsupported: bool,
    /// When set, every call fails with this error.
    fail_all: Option<String>,
}

/// In-memory multiplexer for tests.
#[derive(Debug, Default)]
pub struct FakeMux {
    state: Mutex<FakeState>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls recorded so far.
    pub fn calls(&self) -> Vec<MuxCall> {
        self.state.lock().calls.clone()
    }

    /// Text delivered to a pane via `send_keys`, in order.
    pub fn transcript(&self, pane: &PaneId) -> Vec<String> {
        self.state
            .lock()
            .panes
            .get(pane)
            .map(|p| p.transcript.clone())
            .unwrap_or_default()
    }

    /// Script the text `capture` returns for a pane.
    pub fn script_capture(&self, pane: &PaneId, text: &str) {
        if let Some(p) = self.state.lock().panes.get_mut(pane) {
            p.scripted_capture = Some(text.to_owned());
        }
    }

    /// Make `pipe_to_fifo` report `Unavailable` so streamers fall back.
    pub fn set_pipe_unsupported(&self, unsupported: bool) {
        self.state.lock().pipe_unsupported = unsupported;
    }

    /// Fail every subsequent call with a transient error.
    pub fn fail_all(&self, message: &str) {
        self.state.lock().fail_all = Some(message.to_owned());
    }

    /// Restore normal operation after `fail_all`.
    pub fn heal(&self) {
        self.state.lock().fail_all = None;
    }

    /// Create a pane directly (bypassing split), for parser/streamer tests.
    pub fn seed_pane(&self, session: &str, title: &str, command: &str) -> PaneId {
        let mut state = self.state.lock();
        state.sessions.entry(session.to_owned()).or_default();
        state.next_pane += 1;
        let id = PaneId(format!("%{}", state.next_pane));
        let index = state.panes.values().filter(|p| p.session == session).count();
        state.panes.insert(
            id.clone(),
            FakePane {
                session: session.to_owned(),
                index,
                title: title.to_owned(),
                command: command.to_owned(),
                transcript: vec![],
                scripted_capture: None,
            },
        );
        id
    }

    fn check_fail(state: &FakeState) -> Result<(), MuxError> {
        match &state.fail_all {
            Some(msg) => Err(MuxError::Transient(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Mux for FakeMux {
    async fn create_session(&self, name: &str, dir: &str) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::CreateSession {
            name: name.to_owned(),
            dir: dir.to_owned(),
        });
        state.sessions.insert(name.to_owned(), dir.to_owned());
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::KillSession { name: name.to_owned() });
        if state.sessions.remove(name).is_none() {
            return Err(MuxError::NotFound(format!("can't find session: {name}")));
        }
        state.panes.retain(|_, p| p.session != name);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError> {
        let state = self.state.lock();
        Self::check_fail(&state)?;
        Ok(state
            .sessions
            .keys()
            .map(|name| SessionInfo {
                name: name.clone(),
                pane_count: state.panes.values().filter(|p| &p.session == name).count(),
            })
            .collect())
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        let state = self.state.lock();
        Self::check_fail(&state)?;
        if !state.sessions.contains_key(session) {
            return Err(MuxError::NotFound(format!("can't find session: {session}")));
        }
        let mut panes: Vec<PaneInfo> = state
            .panes
            .iter()
            .filter(|(_, p)| p.session == session)
            .map(|(id, p)| PaneInfo {
                id: id.clone(),
                index: p.index,
                title: p.title.clone(),
                command: p.command.clone(),
            })
            .collect();
        panes.sort_by_key(|p| p.index);
        Ok(panes)
    }

    async fn split_pane(
        &self,
        session: &str,
        dir: &str,
        command: &str,
    ) -> Result<PaneInfo, MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::SplitPane {
            session: session.to_owned(),
            dir: dir.to_owned(),
            command: command.to_owned(),
        });
        if !state.sessions.contains_key(session) {
            return Err(MuxError::NotFound(format!("can't find session: {session}")));
        }
        state.next_pane += 1;
        let id = PaneId(format!("%{}", state.next_pane));
        let index = state.panes.values().filter(|p| p.session == session).count();
        state.panes.insert(
            id.clone(),
            FakePane {
                session: session.to_owned(),
                index,
                title: String::new(),
                command: command.to_owned(),
                transcript: vec![],
                scripted_capture: None,
            },
        );
        Ok(PaneInfo {
            id,
            index,
            title: String::new(),
            command: command.to_owned(),
        })
    }

    async fn send_keys(
        &self,
        pane: &PaneId,
        text: &str,
        press_enter: bool,
    ) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::SendKeys {
            pane: pane.clone(),
            text: text.to_owned(),
            press_enter,
        });
        match state.panes.get_mut(pane) {
            Some(p) => {
                p.transcript.push(text.to_owned());
                Ok(())
            }
            None => Err(MuxError::NotFound(format!("can't find pane: {pane}"))),
        }
    }

    async fn send_interrupt(&self, pane: &PaneId) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::SendInterrupt { pane: pane.clone() });
        if !state.panes.contains_key(pane) {
            return Err(MuxError::NotFound(format!("can't find pane: {pane}")));
        }
        Ok(())
    }

    async fn capture(&self, pane: &PaneId, lines: usize) -> Result<String, MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::Capture { pane: pane.clone(), lines });
        match state.panes.get(pane) {
            Some(p) => Ok(p
                .scripted_capture
                .clone()
                .unwrap_or_else(|| p.transcript.join("\n"))),
            None => Err(MuxError::NotFound(format!("can't find pane: {pane}"))),
        }
    }

    async fn pipe_to_fifo(&self, pane: &PaneId, path: &str) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::PipeToFifo {
            pane: pane.clone(),
            path: path.to_owned(),
        });
        if state.pipe_unsupported {
            return Err(MuxError::Unavailable("pipe-pane unsupported".to_owned()));
        }
        if !state.panes.contains_key(pane) {
            return Err(MuxError::NotFound(format!("can't find pane: {pane}")));
        }
        Ok(())
    }

    async fn stop_pipe(&self, pane: &PaneId) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::StopPipe { pane: pane.clone() });
        Ok(())
    }

    async fn set_pane_title(&self, pane: &PaneId, title: &str) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::SetPaneTitle {
            pane: pane.clone(),
            title: title.to_owned(),
        });
        match state.panes.get_mut(pane) {
            Some(p) => {
                p.title = title.to_owned();
                Ok(())
            }
            None => Err(MuxError::NotFound(format!("can't find pane: {pane}"))),
        }
    }

    async fn kill_pane(&self, pane: &PaneId) -> Result<(), MuxError> {
        let mut state = self.state.lock();
        Self::check_fail(&state)?;
        state.calls.push(MuxCall::KillPane { pane: pane.clone() });
        if state.panes.remove(pane).is_none() {
            return Err(MuxError::NotFound(format!("can't find pane: {pane}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
