// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ensemble coordination: run N reasoning modes in parallel over one
//! question, checkpoint per-mode progress durably, and synthesize a unified
//! answer.
//!
//! Assignment state machines advance from bus events in a single driver
//! task per run, so status only ever moves forward (`pending → injecting →
//! active → done | error`); operator `resume` is the one sanctioned reset.

pub mod checkpoint;
pub mod collect;
pub mod merge;
pub mod preset;
pub mod synthesize;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::Config;
use crate::dispatch::{Dispatcher, SendOptions, Targeting};
use crate::error::{NtmError, Result};
use crate::event::{Event, EventKind};
use crate::lifecycle::{LifecycleController, SpawnSpec};
use crate::mux::{Mux, PaneId};
use crate::naming::SessionName;
use crate::parser::AgentState;

use checkpoint::{CheckpointStore, Metadata, ModeList};
use collect::ModeOutput;
use preset::{Preset, SynthesisStrategy};
use synthesize::{OutputFormat, SynthesisLimits, SynthesisResult};

/// Grace period between interrupt and force kill during a graceful stop.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Lines captured from a pane when collecting a mode's output.
const COLLECT_LINES: usize = 2000;

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Stopped,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Per-assignment state. Monotonic except via operator resume/rerun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Injecting,
    Active,
    Done,
    Error,
}

/// One mode bound to one pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub mode_id: String,
    pub agent: crate::agent::AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane: Option<PaneId>,
    pub status: AssignmentStatus,
    #[serde(default)]
    pub retries_used: u32,
}

/// Durable record of one ensemble run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSession {
    pub id: String,
    pub question: String,
    pub preset_name: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub synthesis_strategy: SynthesisStrategy,
    pub assignments: Vec<Assignment>,
    pub budget: preset::Budget,
    /// Multiplexer session hosting the run's panes.
    pub mux_session: String,
}

/// Result of a stop call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopReport {
    pub success: bool,
    pub final_status: String,
    /// Panes actually interrupted/killed by this call.
    pub stopped: usize,
}

pub struct EnsembleCoordinator {
    mux: Arc<dyn Mux>,
    lifecycle: Arc<LifecycleController>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
    store: CheckpointStore,
    config: Arc<Config>,
    /// In-memory view of live runs. The driver task is the single writer
    /// for a running session; other methods mutate only terminal or
    /// not-yet-driven runs.
    sessions: Mutex<HashMap<String, EnsembleSession>>,
}

impl EnsembleCoordinator {
    pub fn new(
        mux: Arc<dyn Mux>,
        lifecycle: Arc<LifecycleController>,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<EventBus>,
        store: CheckpointStore,
        config: Arc<Config>,
    ) -> Self {
        Self {
            mux,
            lifecycle,
            dispatcher,
            bus,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a run: create the session record, persist the initial
    /// checkpoint, spawn one pane per mode, and inject prompts.
    pub async fn start(
        &self,
        question: &str,
        preset: &Preset,
        cancel: &CancellationToken,
    ) -> Result<String> {
        preset.validate()?;
        let run_id = Uuid::new_v4().to_string();
        let short = &run_id[..8];
        let mux_session = format!("ens-{short}");

        let session = EnsembleSession {
            id: run_id.clone(),
            question: question.to_owned(),
            preset_name: preset.name.clone(),
            created_at: Utc::now(),
            status: RunStatus::Running,
            synthesis_strategy: preset.strategy,
            assignments: preset
                .modes
                .iter()
                .map(|mode| Assignment {
                    mode_id: mode.id.clone(),
                    agent: mode.agent,
                    pane: None,
                    status: AssignmentStatus::Pending,
                    retries_used: 0,
                })
                .collect(),
            budget: preset.budget.clone(),
            mux_session: mux_session.clone(),
        };

        let metadata = Metadata::new(
            &run_id,
            &mux_session,
            preset.modes.iter().map(|m| m.id.clone()).collect(),
        );
        self.store.save_metadata(&metadata)?;
        self.store.save_json(&run_id, "session", &session)?;
        self.sessions.lock().insert(run_id.clone(), session);

        self.bus.publish_sync(Event::new(
            EventKind::EnsembleStarted,
            Some(&mux_session),
            serde_json::json!({ "run_id": run_id, "preset": preset.name }),
        ));

        let mode_ids: Vec<String> = preset.modes.iter().map(|m| m.id.clone()).collect();
        self.launch_modes(&run_id, preset, &mode_ids, cancel).await?;
        Ok(run_id)
    }

    /// Spawn and inject the given modes. Used by start, resume, and rerun.
    async fn launch_modes(
        &self,
        run_id: &str,
        preset: &Preset,
        mode_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mux_session = self
            .sessions
            .lock()
            .get(run_id)
            .map(|s| s.mux_session.clone())
            .ok_or_else(|| NtmError::NotFound(format!("run {run_id} not found")))?;
        let name = SessionName::parse(&mux_session)?;
        let question = self
            .sessions
            .lock()
            .get(run_id)
            .map(|s| s.question.clone())
            .unwrap_or_default();

        for mode_id in mode_ids {
            let Some(mode) = preset.mode(mode_id) else {
                return Err(NtmError::NotFound(format!(
                    "mode {mode_id:?} not in preset {}",
                    preset.name
                )));
            };

            // Spawn a typed pane through the lifecycle controller.
            let report = self
                .lifecycle
                .spawn(
                    SpawnSpec {
                        name: name.clone(),
                        counts: vec![(mode.agent, 1)],
                        working_dir: std::env::temp_dir().display().to_string(),
                        dry_run: false,
                    },
                    cancel,
                )
                .await?;
            let Some(record) = report.panes.first() else {
                self.mark_error(run_id, mode_id, "pane spawn failed")?;
                continue;
            };

            self.transition(run_id, mode_id, AssignmentStatus::Injecting, Some(&record.id))?;

            let prompt = mode.render_prompt(&question);
            let options = SendOptions {
                targeting: Targeting::Panes(vec![record.index]),
                ..SendOptions::default()
            };
            match self.dispatcher.send(&name, &prompt, &options).await {
                Ok(_) => {
                    self.transition(run_id, mode_id, AssignmentStatus::Active, None)?;
                    self.bus.publish_sync(Event::new(
                        EventKind::EnsembleModeActive,
                        Some(&mux_session),
                        serde_json::json!({ "run_id": run_id, "mode": mode_id }),
                    ));
                }
                Err(e) => {
                    warn!(run_id, mode_id, error = %e, "prompt injection failed");
                    self.mark_error(run_id, mode_id, &e.to_string())?;
                }
            }
        }
        Ok(())
    }

    /// Advance one assignment. Status never moves backwards here; resets
    /// go through [`EnsembleCoordinator::rerun_mode`] or resume.
    fn transition(
        &self,
        run_id: &str,
        mode_id: &str,
        into: AssignmentStatus,
        pane: Option<&PaneId>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(run_id)
            .ok_or_else(|| NtmError::NotFound(format!("run {run_id} not found")))?;
        let assignment = session
            .assignments
            .iter_mut()
            .find(|a| a.mode_id == mode_id)
            .ok_or_else(|| NtmError::NotFound(format!("mode {mode_id} not in run")))?;
        if into <= assignment.status {
            return Err(NtmError::Fatal(format!(
                "assignment {mode_id}: illegal transition {:?} -> {into:?}",
                assignment.status
            )));
        }
        assignment.status = into;
        if let Some(pane) = pane {
            assignment.pane = Some(pane.clone());
        }
        let snapshot = session.clone();
        drop(sessions);
        self.store.save_json(run_id, "session", &snapshot)?;
        Ok(())
    }

    fn mark_error(&self, run_id: &str, mode_id: &str, detail: &str) -> Result<()> {
        let snapshot = {
            let mut sessions = self.sessions.lock();
            sessions.get_mut(run_id).map(|session| {
                if let Some(a) =
                    session.assignments.iter_mut().find(|a| a.mode_id == mode_id)
                {
                    a.status = AssignmentStatus::Error;
                }
                session.clone()
            })
        };
        if let Some(snapshot) = snapshot {
            self.store.save_json(run_id, "session", &snapshot)?;
        }
        let mut metadata = self.store.load_metadata(run_id)?;
        metadata.transition(mode_id, ModeList::Error);
        self.store.save_metadata(&metadata)?;
        self.bus.publish_sync(Event::new(
            EventKind::EnsembleModeError,
            None,
            serde_json::json!({ "run_id": run_id, "mode": mode_id, "detail": detail }),
        ));
        Ok(())
    }

    fn mark_done(&self, run_id: &str, mode_id: &str, output: &str) -> Result<()> {
        // Artifact first, then metadata: a crash between the two leaves a
        // pending mode with an orphan artifact, which resume overwrites.
        self.store.save_mode_output(run_id, mode_id, output)?;
        let snapshot = {
            let mut sessions = self.sessions.lock();
            sessions.get_mut(run_id).map(|session| {
                if let Some(a) =
                    session.assignments.iter_mut().find(|a| a.mode_id == mode_id)
                {
                    a.status = AssignmentStatus::Done;
                }
                session.clone()
            })
        };
        if let Some(snapshot) = snapshot {
            self.store.save_json(run_id, "session", &snapshot)?;
        }
        let mut metadata = self.store.load_metadata(run_id)?;
        metadata.transition(mode_id, ModeList::Completed);
        self.store.save_metadata(&metadata)?;
        self.bus.publish_sync(Event::new(
            EventKind::EnsembleModeDone,
            None,
            serde_json::json!({ "run_id": run_id, "mode": mode_id }),
        ));
        Ok(())
    }

    /// Drive a run to completion: observe parsed pane states from the bus,
    /// collect and validate outputs, enforce per-mode timeouts.
    pub async fn drive(&self, run_id: &str, cancel: &CancellationToken) -> Result<RunStatus> {
        let (timeout, mux_session) = {
            let sessions = self.sessions.lock();
            let session = sessions
                .get(run_id)
                .ok_or_else(|| NtmError::NotFound(format!("run {run_id} not found")))?;
            (session.budget.mode_timeout(), session.mux_session.clone())
        };

        let mut sub = self.bus.subscribe();
        let started = tokio::time::Instant::now();
        let mut tick = tokio::time::interval(Duration::from_millis(500));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut cancelled = false;
        loop {
            if self.active_modes(run_id).is_empty() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(run_id, "drive cancelled");
                    cancelled = true;
                    break;
                }
                _ = tick.tick() => {
                    if started.elapsed() >= timeout {
                        for mode_id in self.active_modes(run_id) {
                            self.mark_error(run_id, &mode_id, "mode timeout")?;
                        }
                        break;
                    }
                }
                event = sub.rx.recv() => {
                    let Some(event) = event else { break };
                    if event.kind != EventKind::AgentState {
                        continue;
                    }
                    self.handle_state_event(run_id, &mux_session, &event).await?;
                }
            }
        }

        // A cancelled drive leaves the run resumable.
        if cancelled {
            return Ok(RunStatus::Running);
        }

        // Final status.
        let snapshot = {
            let mut sessions = self.sessions.lock();
            let session = sessions
                .get_mut(run_id)
                .ok_or_else(|| NtmError::NotFound(format!("run {run_id} not found")))?;
            if session.status == RunStatus::Running {
                let all_error = session
                    .assignments
                    .iter()
                    .all(|a| a.status == AssignmentStatus::Error);
                session.status = if all_error {
                    RunStatus::Error
                } else {
                    RunStatus::Completed
                };
            }
            session.clone()
        };
        self.store.save_json(run_id, "session", &snapshot)?;
        Ok(snapshot.status)
    }

    async fn handle_state_event(
        &self,
        run_id: &str,
        mux_session: &str,
        event: &Event,
    ) -> Result<()> {
        if event.session.as_deref() != Some(mux_session) {
            return Ok(());
        }
        let Some(pane) = event.payload["pane"].as_str() else {
            return Ok(());
        };
        let pane = PaneId(pane.to_owned());
        let Ok(state) =
            serde_json::from_value::<AgentState>(event.payload["state"].clone())
        else {
            return Ok(());
        };

        let Some((mode_id, retries_used)) = ({
            let sessions = self.sessions.lock();
            sessions.get(run_id).and_then(|s| {
                s.assignments
                    .iter()
                    .find(|a| {
                        a.pane.as_ref() == Some(&pane)
                            && a.status == AssignmentStatus::Active
                    })
                    .map(|a| (a.mode_id.clone(), a.retries_used))
            })
        }) else {
            return Ok(());
        };

        if state.is_in_error {
            self.mark_error(run_id, &mode_id, "pane entered error state")?;
            return Ok(());
        }
        if !state.is_idle {
            return Ok(());
        }

        // Idle: collect and validate.
        let raw = self.mux.capture(&pane, COLLECT_LINES).await?;
        match collect::validate(&mode_id, &raw) {
            Ok(_) => self.mark_done(run_id, &mode_id, &raw)?,
            Err(e) => {
                let budget = {
                    let sessions = self.sessions.lock();
                    sessions.get(run_id).map(|s| s.budget.retries).unwrap_or(0)
                };
                if retries_used >= budget {
                    self.mark_error(run_id, &mode_id, &e.to_string())?;
                } else {
                    debug!(run_id, mode_id, "output invalid, re-injecting");
                    self.bump_retry(run_id, &mode_id);
                    self.reinject(run_id, &mode_id).await?;
                }
            }
        }
        Ok(())
    }

    fn bump_retry(&self, run_id: &str, mode_id: &str) {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get_mut(run_id) {
            if let Some(a) = session.assignments.iter_mut().find(|a| a.mode_id == mode_id)
            {
                a.retries_used += 1;
            }
        }
    }

    async fn reinject(&self, run_id: &str, mode_id: &str) -> Result<()> {
        let (mux_session, question, preset_name, pane_index) = {
            let sessions = self.sessions.lock();
            let session = sessions
                .get(run_id)
                .ok_or_else(|| NtmError::NotFound(format!("run {run_id} not found")))?;
            let assignment = session
                .assignments
                .iter()
                .find(|a| a.mode_id == mode_id)
                .ok_or_else(|| NtmError::NotFound(format!("mode {mode_id} not in run")))?;
            let pane = assignment
                .pane
                .clone()
                .ok_or_else(|| NtmError::NotFound(format!("mode {mode_id} has no pane")))?;
            let index = self
                .lifecycle
                .panes_in(&session.mux_session)
                .into_iter()
                .find(|p| p.id == pane)
                .map(|p| p.index)
                .ok_or_else(|| NtmError::NotFound(format!("pane {pane} gone")))?;
            (
                session.mux_session.clone(),
                session.question.clone(),
                session.preset_name.clone(),
                index,
            )
        };
        let preset = preset::resolve(&preset_name)?;
        let Some(mode) = preset.mode(mode_id) else {
            return Err(NtmError::NotFound(format!("mode {mode_id} not in preset")));
        };
        let name = SessionName::parse(&mux_session)?;
        let options = SendOptions {
            targeting: Targeting::Panes(vec![pane_index]),
            ..SendOptions::default()
        };
        self.dispatcher
            .send(&name, &mode.render_prompt(&question), &options)
            .await?;
        Ok(())
    }

    fn active_modes(&self, run_id: &str) -> Vec<String> {
        let sessions = self.sessions.lock();
        sessions
            .get(run_id)
            .map(|s| {
                s.assignments
                    .iter()
                    .filter(|a| {
                        matches!(
                            a.status,
                            AssignmentStatus::Pending
                                | AssignmentStatus::Injecting
                                | AssignmentStatus::Active
                        )
                    })
                    .map(|a| a.mode_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stop a run. Graceful: interrupt, wait, kill, capture partials.
    /// `force` skips the wait; `no_collect` skips partial capture.
    /// Already-terminal runs return success without any shutdown work.
    pub async fn stop(
        &self,
        run_id: &str,
        force: bool,
        no_collect: bool,
    ) -> Result<StopReport> {
        let session = self.load_session(run_id)?;
        if session.status.is_terminal() {
            return Ok(StopReport {
                success: true,
                final_status: session.status.as_str().to_owned(),
                stopped: 0,
            });
        }

        let live: Vec<(String, PaneId)> = session
            .assignments
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    AssignmentStatus::Injecting | AssignmentStatus::Active
                )
            })
            .filter_map(|a| a.pane.clone().map(|p| (a.mode_id.clone(), p)))
            .collect();

        for (_, pane) in &live {
            let _ = self.mux.send_interrupt(pane).await;
        }
        if !force && !live.is_empty() {
            tokio::time::sleep(STOP_GRACE).await;
        }

        if !no_collect {
            for (mode_id, pane) in &live {
                if let Ok(raw) = self.mux.capture(pane, COLLECT_LINES).await {
                    if !raw.trim().is_empty() {
                        let _ = self
                            .store
                            .save_mode_output(run_id, &format!("{mode_id}.partial"), &raw);
                    }
                }
            }
        }

        for (_, pane) in &live {
            let _ = self.mux.kill_pane(pane).await;
        }
        let pane_ids: Vec<PaneId> = live.iter().map(|(_, p)| p.clone()).collect();
        self.lifecycle.forget_panes(&pane_ids, &session.mux_session);

        let snapshot = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .entry(run_id.to_owned())
                .or_insert_with(|| session.clone());
            entry.status = RunStatus::Stopped;
            entry.clone()
        };
        self.store.save_json(run_id, "session", &snapshot)?;

        self.bus.publish_sync(Event::new(
            EventKind::EnsembleStopped,
            Some(&session.mux_session),
            serde_json::json!({ "run_id": run_id, "stopped": live.len() }),
        ));

        Ok(StopReport {
            success: true,
            final_status: snapshot.status.as_str().to_owned(),
            stopped: live.len(),
        })
    }

    /// Resume a run from its checkpoint. Pending and errored modes re-run;
    /// completed modes keep their artifacts when `skip_done` (the default).
    pub async fn resume(
        &self,
        run_id: &str,
        skip_done: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        let metadata = self.store.load_metadata(run_id)?;
        let mut session = self.load_session(run_id)?;
        let preset = preset::resolve(&session.preset_name)?;

        let mut to_run: Vec<String> = metadata
            .pending_ids
            .iter()
            .chain(&metadata.error_ids)
            .cloned()
            .collect();
        if !skip_done {
            to_run.extend(metadata.completed_ids.iter().cloned());
        }
        if to_run.is_empty() {
            return Ok(vec![]);
        }

        // Operator-sanctioned reset: the one place status moves backwards.
        let mut metadata = metadata;
        for mode_id in &to_run {
            metadata.transition(mode_id, ModeList::Pending);
            if !skip_done {
                self.store.discard_mode_output(run_id, mode_id);
            }
            if let Some(a) = session.assignments.iter_mut().find(|a| &a.mode_id == mode_id)
            {
                a.status = AssignmentStatus::Pending;
                a.pane = None;
                a.retries_used = 0;
            }
        }
        session.status = RunStatus::Running;
        self.store.save_metadata(&metadata)?;
        self.store.save_json(run_id, "session", &session)?;
        self.sessions.lock().insert(run_id.to_owned(), session);

        self.launch_modes(run_id, &preset, &to_run, cancel).await?;
        Ok(to_run)
    }

    /// Re-run one mode, identified by id or display code. Its prior
    /// artifact is discarded.
    pub async fn rerun_mode(
        &self,
        run_id: &str,
        mode_ref: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut session = self.load_session(run_id)?;
        let preset = preset::resolve(&session.preset_name)?;
        let mode = preset
            .mode(mode_ref)
            .ok_or_else(|| NtmError::NotFound(format!("mode {mode_ref:?} not found")))?;
        let mode_id = mode.id.clone();

        self.store.discard_mode_output(run_id, &mode_id);
        let mut metadata = self.store.load_metadata(run_id)?;
        metadata.transition(&mode_id, ModeList::Pending);
        self.store.save_metadata(&metadata)?;

        if let Some(a) = session.assignments.iter_mut().find(|a| a.mode_id == mode_id) {
            a.status = AssignmentStatus::Pending;
            a.pane = None;
            a.retries_used = 0;
        }
        session.status = RunStatus::Running;
        self.store.save_json(run_id, "session", &session)?;
        self.sessions.lock().insert(run_id.to_owned(), session);

        self.launch_modes(run_id, &preset, &[mode_id.clone()], cancel).await?;
        Ok(mode_id)
    }

    /// Synthesize the run's validated outputs.
    ///
    /// Readiness requires no pending or active modes; `force` synthesizes
    /// whatever validated, errors notwithstanding.
    pub fn synthesize(
        &self,
        run_id: &str,
        strategy: Option<SynthesisStrategy>,
        force: bool,
    ) -> Result<SynthesisResult> {
        let metadata = self.store.load_metadata(run_id)?;
        if !metadata.pending_ids.is_empty() && !force {
            return Err(NtmError::Validation(format!(
                "run {run_id} has {} unfinished mode(s); use force to synthesize anyway",
                metadata.pending_ids.len()
            )));
        }

        let mut outputs: Vec<ModeOutput> = Vec::new();
        for mode_id in &metadata.completed_ids {
            let Some(raw) = self.store.load_mode_output(run_id, mode_id) else {
                continue;
            };
            match collect::validate(mode_id, &raw) {
                Ok(output) => outputs.push(output),
                Err(e) => warn!(run_id, mode_id, error = %e, "stored artifact no longer validates"),
            }
        }
        if outputs.is_empty() {
            return Err(NtmError::Validation(format!(
                "run {run_id} has no validated outputs to synthesize"
            )));
        }

        let strategy = strategy.unwrap_or_else(|| {
            self.load_session(run_id)
                .map(|s| s.synthesis_strategy)
                .unwrap_or_default()
        });
        let limits = SynthesisLimits {
            max_findings: self.config.ensemble.max_findings,
            min_confidence: self.config.ensemble.min_confidence,
        };
        let result = synthesize::synthesize(&outputs, strategy, limits);

        self.store.save_json(run_id, "provenance", &result.provenance())?;
        self.bus.publish_sync(Event::new(
            EventKind::EnsembleSynthesized,
            None,
            serde_json::json!({
                "run_id": run_id,
                "findings": result.findings.len(),
                "confidence": result.confidence,
            }),
        ));
        Ok(result)
    }

    /// Render a synthesized result in the requested format.
    pub fn synthesize_rendered(
        &self,
        run_id: &str,
        strategy: Option<SynthesisStrategy>,
        format: OutputFormat,
        force: bool,
    ) -> Result<String> {
        let result = self.synthesize(run_id, strategy, force)?;
        result
            .render(format)
            .map_err(|e| NtmError::Fatal(format!("render: {e}")))
    }

    /// Stored provenance for a run, if synthesis has happened.
    pub fn provenance(&self, run_id: &str) -> Result<Vec<merge::Provenance>> {
        self.store.load_json(run_id, "provenance")
    }

    /// Current session record (memory first, disk fallback).
    pub fn load_session(&self, run_id: &str) -> Result<EnsembleSession> {
        if let Some(session) = self.sessions.lock().get(run_id) {
            return Ok(session.clone());
        }
        self.store.load_json(run_id, "session")
    }

    /// The newest run id, for commands that default to "the latest run".
    pub fn latest_run(&self) -> Option<String> {
        self.store.list_runs().into_iter().next()
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
