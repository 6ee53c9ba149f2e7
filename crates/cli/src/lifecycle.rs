// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane lifecycle: the only component that creates and destroys panes.
//!
//! Spawn path: validate names, create or reuse the session, pass admission,
//! split the pane with a `cd <dir> && <cmd>` wrapped launch command, title
//! it `<session>__<shortType>_<n>`, record metadata, attach the streamer.
//! Teardown is symmetric: best-effort interrupt, timed wait, force kill,
//! batched slot release, events.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::AgentType;
use crate::bus::EventBus;
use crate::config::Config;
use crate::error::{NtmError, Result};
use crate::event::{Event, EventKind};
use crate::mux::{wrap_launch_command, Mux, MuxError, PaneId};
use crate::naming::SessionName;
use crate::parser::Parser;
use crate::scheduler::{SpawnRequest, SpawnScheduler, SpawnSlot};
use crate::stream::{StreamEvent, StreamManager};

/// Metadata for a pane this controller opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneRecord {
    pub id: PaneId,
    pub session: String,
    pub index: usize,
    pub title: String,
    pub agent: AgentType,
    pub command: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub spawned_at: DateTime<Utc>,
}

struct PaneEntry {
    record: PaneRecord,
    slot: Option<SpawnSlot>,
}

/// What to spawn into a session.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub name: SessionName,
    /// `(agent type, pane count)` pairs, spawned in order.
    pub counts: Vec<(AgentType, usize)>,
    pub working_dir: String,
    pub dry_run: bool,
}

/// Result of a spawn call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnReport {
    pub session: String,
    pub created_session: bool,
    pub panes: Vec<PaneRecord>,
    pub failed: usize,
    /// Resolved launch commands, populated on dry runs.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub planned_commands: Vec<String>,
}

pub struct LifecycleController {
    mux: Arc<dyn Mux>,
    scheduler: Arc<SpawnScheduler>,
    streams: Arc<StreamManager>,
    bus: Arc<EventBus>,
    config: Arc<Config>,
    panes: Arc<Mutex<HashMap<PaneId, PaneEntry>>>,
    /// Most recent parsed state per pane, maintained by the detection
    /// router. Value-typed snapshots; replaced whole on each parse.
    states: Arc<Mutex<HashMap<PaneId, crate::parser::AgentState>>>,
}

impl LifecycleController {
    pub fn new(
        mux: Arc<dyn Mux>,
        scheduler: Arc<SpawnScheduler>,
        streams: Arc<StreamManager>,
        bus: Arc<EventBus>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            mux,
            scheduler,
            streams,
            bus,
            config,
            panes: Arc::new(Mutex::new(HashMap::new())),
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn agents per the spec, creating the session if needed.
    pub async fn spawn(&self, spec: SpawnSpec, cancel: &CancellationToken) -> Result<SpawnReport> {
        let session = spec.name.full();

        if spec.dry_run {
            let mut planned = Vec::new();
            for (agent, count) in &spec.counts {
                let command = self.launch_command(*agent)?;
                for _ in 0..*count {
                    planned.push(wrap_launch_command(&spec.working_dir, &command));
                }
            }
            return Ok(SpawnReport {
                session,
                created_session: false,
                panes: vec![],
                failed: 0,
                planned_commands: planned,
            });
        }

        let created = self.ensure_session(&session, &spec.working_dir).await?;

        let mut report = SpawnReport {
            session: session.clone(),
            created_session: created,
            panes: vec![],
            failed: 0,
            planned_commands: vec![],
        };
        for (agent, count) in spec.counts {
            for _ in 0..count {
                match self.spawn_one(&session, &spec.working_dir, agent, cancel).await {
                    Ok(record) => report.panes.push(record),
                    Err(e) => {
                        warn!(session, agent = %agent, error = %e, "spawn failed");
                        report.failed += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Add panes to an existing session. Missing sessions are an error, not
    /// an implicit create.
    pub async fn add(
        &self,
        name: &SessionName,
        counts: Vec<(AgentType, usize)>,
        working_dir: String,
        cancel: &CancellationToken,
    ) -> Result<SpawnReport> {
        let session = name.full();
        let sessions = self.mux.list_sessions().await?;
        if !sessions.iter().any(|s| s.name == session) {
            return Err(NtmError::NotFound(format!("session {session} not found")));
        }
        self.spawn(
            SpawnSpec {
                name: name.clone(),
                counts,
                working_dir,
                dry_run: false,
            },
            cancel,
        )
        .await
    }

    async fn ensure_session(&self, session: &str, dir: &str) -> Result<bool> {
        let sessions = self.mux.list_sessions().await?;
        if sessions.iter().any(|s| s.name == session) {
            return Ok(false);
        }
        self.mux.create_session(session, dir).await?;
        info!(session, dir, "created session");
        Ok(true)
    }

    /// Spawn one agent pane, going through admission and the request's
    /// retry budget. Every retry re-enters admission.
    async fn spawn_one(
        &self,
        session: &str,
        dir: &str,
        agent: AgentType,
        cancel: &CancellationToken,
    ) -> Result<PaneRecord> {
        let request = SpawnRequest {
            agent,
            session: session.to_owned(),
            working_dir: dir.to_owned(),
            command: self.launch_command(agent)?,
            retries: self.config.scheduler.default_retries,
            initial_delay_ms: None,
        };
        if let Some(delay) = request.initial_delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut last_err: Option<NtmError> = None;

        for attempt in 0..=request.retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.scheduler.retry_delay()).await;
            }
            let permit = self.scheduler.admit(agent, cancel).await?;
            self.bus.publish_sync(Event::new(
                EventKind::SpawnStarted,
                Some(session),
                serde_json::json!({ "agent": agent.as_str(), "attempt": attempt }),
            ));

            match self.open_pane(session, dir, agent, &request.command).await {
                Ok(record) => {
                    let slot = permit.succeeded();
                    self.panes.lock().insert(
                        record.id.clone(),
                        PaneEntry { record: record.clone(), slot: Some(slot) },
                    );
                    if let Err(e) = self.streams.start_stream(&record.id).await {
                        warn!(pane = %record.id, error = %e, "streamer attach failed");
                    }
                    self.bus.publish_sync(Event::new(
                        EventKind::PaneOpened,
                        Some(session),
                        serde_json::json!({
                            "pane": record.id.0,
                            "agent": agent.as_str(),
                            "title": record.title,
                        }),
                    ));
                    return Ok(record);
                }
                Err(e) => {
                    let resource = matches!(
                        e,
                        MuxError::Unavailable(_) | MuxError::Transient(_)
                    );
                    permit.failed(resource);
                    debug!(session, agent = %agent, attempt, error = %e, "spawn attempt failed");
                    last_err = Some(e.into());
                }
            }
        }
        Err(last_err.unwrap_or_else(|| NtmError::Fatal("spawn retry loop exhausted".into())))
    }

    async fn open_pane(
        &self,
        session: &str,
        dir: &str,
        agent: AgentType,
        command: &str,
    ) -> std::result::Result<PaneRecord, MuxError> {
        let wrapped = wrap_launch_command(dir, command);
        let info = self.mux.split_pane(session, dir, &wrapped).await?;

        let ordinal = 1 + self
            .panes
            .lock()
            .values()
            .filter(|p| p.record.session == session && p.record.agent == agent)
            .count();
        let title = format!("{session}__{}_{ordinal}", agent.short_code());
        if let Err(e) = self.mux.set_pane_title(&info.id, &title).await {
            warn!(pane = %info.id, error = %e, "pane title failed");
        }

        Ok(PaneRecord {
            id: info.id,
            session: session.to_owned(),
            index: info.index,
            title,
            agent,
            command: wrapped,
            tags: BTreeSet::new(),
            spawned_at: Utc::now(),
        })
    }

    fn launch_command(&self, agent: AgentType) -> Result<String> {
        self.config.agent_command(agent).ok_or_else(|| {
            NtmError::Validation(format!("no launch command configured for {agent}"))
        })
    }

    /// Send Ctrl-C to agent panes of the session. Returns the count hit.
    pub async fn interrupt(&self, name: &SessionName) -> Result<usize> {
        let session = name.full();
        let targets: Vec<PaneId> = self
            .panes
            .lock()
            .values()
            .filter(|p| p.record.session == session && p.record.agent.is_agent())
            .map(|p| p.record.id.clone())
            .collect();
        if targets.is_empty() {
            return Err(NtmError::NotFound(format!(
                "no agent panes recorded for session {session}"
            )));
        }
        let mut hit = 0;
        for pane in &targets {
            match self.mux.send_interrupt(pane).await {
                Ok(()) => hit += 1,
                Err(e) => warn!(pane = %pane, error = %e, "interrupt failed"),
            }
        }
        Ok(hit)
    }

    /// Tear a session down: best-effort interrupt, timed wait for graceful
    /// exit, force kill, batched slot release.
    pub async fn kill(&self, name: &SessionName, force: bool, grace: Duration) -> Result<()> {
        let session = name.full();

        let pane_ids: Vec<PaneId> = self
            .panes
            .lock()
            .values()
            .filter(|p| p.record.session == session)
            .map(|p| p.record.id.clone())
            .collect();

        if !force {
            for pane in &pane_ids {
                let _ = self.mux.send_interrupt(pane).await;
            }
            if !pane_ids.is_empty() {
                tokio::time::sleep(grace).await;
            }
        }

        for pane in &pane_ids {
            self.streams.stop_stream(pane).await;
        }
        self.mux.kill_session(&session).await?;
        self.forget_panes(&pane_ids, &session);
        Ok(())
    }

    /// Drop records for closed panes and release their slots in one batch,
    /// so a mass close does not stampede re-admission.
    pub fn forget_panes(&self, pane_ids: &[PaneId], session: &str) {
        let mut slots: Vec<SpawnSlot> = Vec::new();
        {
            let mut panes = self.panes.lock();
            let mut states = self.states.lock();
            for id in pane_ids {
                states.remove(id);
                if let Some(mut entry) = panes.remove(id) {
                    if let Some(slot) = entry.slot.take() {
                        slots.push(slot);
                    }
                }
            }
        }
        for id in pane_ids {
            self.bus.publish_sync(Event::new(
                EventKind::PaneClosed,
                Some(session),
                serde_json::json!({ "pane": id.0 }),
            ));
        }
        if !slots.is_empty() {
            self.scheduler.release_batch(slots);
        }
    }

    /// Adopt panes of an existing session into the registry (fresh process
    /// working against a live multiplexer). Agent types come from the
    /// `<session>__<code>_<n>` title convention; unrecognized panes record
    /// as `Unknown`. Adopted panes hold no scheduler slot.
    pub async fn adopt_session(&self, session: &str) -> Result<usize> {
        let infos = self.mux.list_panes(session).await?;
        let mut adopted = 0;
        let mut panes = self.panes.lock();
        for info in infos {
            if panes.contains_key(&info.id) {
                continue;
            }
            let agent = agent_from_title(&info.title).unwrap_or(AgentType::Unknown);
            panes.insert(
                info.id.clone(),
                PaneEntry {
                    record: PaneRecord {
                        id: info.id,
                        session: session.to_owned(),
                        index: info.index,
                        title: info.title,
                        agent,
                        command: info.command,
                        tags: BTreeSet::new(),
                        spawned_at: Utc::now(),
                    },
                    slot: None,
                },
            );
            adopted += 1;
        }
        Ok(adopted)
    }

    /// Recorded panes for a session, ordered by pane index.
    pub fn panes_in(&self, session: &str) -> Vec<PaneRecord> {
        let mut records: Vec<PaneRecord> = self
            .panes
            .lock()
            .values()
            .filter(|p| p.record.session == session)
            .map(|p| p.record.clone())
            .collect();
        records.sort_by_key(|r| r.index);
        records
    }

    /// The recorded agent type for a pane, if known.
    pub fn agent_for(&self, pane: &PaneId) -> Option<AgentType> {
        self.panes.lock().get(pane).map(|p| p.record.agent)
    }

    /// The most recently parsed state for a pane, if any.
    pub fn last_state(&self, pane: &PaneId) -> Option<crate::parser::AgentState> {
        self.states.lock().get(pane).cloned()
    }

    /// Add tags to a recorded pane.
    pub fn tag_pane(&self, pane: &PaneId, tags: &[String]) -> Result<()> {
        let mut panes = self.panes.lock();
        let entry = panes
            .get_mut(pane)
            .ok_or_else(|| NtmError::NotFound(format!("pane {pane} not recorded")))?;
        entry.record.tags.extend(tags.iter().cloned());
        Ok(())
    }

    /// Spawn the detection router: parses each stream event with the
    /// recorded agent type as a hint and publishes the derived state.
    pub fn attach_detection(
        &self,
        mut rx: tokio::sync::mpsc::Receiver<StreamEvent>,
        parser: Parser,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(&self.bus);
        let panes = Arc::clone(&self.panes);
        let states = Arc::clone(&self.states);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let (hint, session) = {
                    let panes = panes.lock();
                    match panes.get(&event.target) {
                        Some(entry) => {
                            (Some(entry.record.agent), Some(entry.record.session.clone()))
                        }
                        None => (None, None),
                    }
                };
                let text = event.lines.join("\n");
                let state = match hint {
                    Some(agent) => parser.parse_with_hint(text.as_bytes(), agent),
                    None => parser.parse(text.as_bytes()),
                };
                states.lock().insert(event.target.clone(), state.clone());
                let payload = serde_json::json!({
                    "pane": event.target.0,
                    "seq": event.seq,
                    "state": state,
                });
                bus.publish(Event::new(EventKind::AgentState, session.as_deref(), payload))
                    .await;
            }
        })
    }
}

/// Parse the agent type from a `<session>__<code>_<n>` pane title.
fn agent_from_title(title: &str) -> Option<AgentType> {
    let (_, tail) = title.rsplit_once("__")?;
    let (code, _) = tail.split_once('_')?;
    AgentType::parse(code)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
