// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt dispatch: preflight, redaction, targeting, smart routing,
//! reservations, fan-out.
//!
//! The pipeline order is fixed: base-prompt resolution, preflight lint,
//! redaction policy, routing, reservations, then fan-out (or a dry-run
//! report). In `block` mode with findings, no bytes reach any pane.

pub mod batch;
pub mod reservation;
pub mod route;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::AgentType;
use crate::bus::EventBus;
use crate::config::Config;
use crate::error::{NtmError, Result};
use crate::event::{Event, EventKind};
use crate::history::{HistoryEntry, HistoryStore};
use crate::lifecycle::{LifecycleController, PaneRecord};
use crate::mux::Mux;
use crate::naming::SessionName;
use crate::preflight;
use crate::redact::{redactor, RedactionMode};

use reservation::ReservationTable;
use route::PaneCandidate;

/// Which panes a send addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targeting {
    /// Every pane in the session.
    All,
    /// Agent panes only (the default).
    Agents,
    /// Panes running one of the given agent types.
    Types(Vec<AgentType>),
    /// Explicit session-local pane indices. Disables smart routing.
    Panes(Vec<usize>),
    /// Panes carrying any of the given tags.
    Tags(Vec<String>),
}

impl Default for Targeting {
    fn default() -> Self {
        Self::Agents
    }
}

/// What to do when a requested reservation conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationPolicy {
    /// Fail the send.
    #[default]
    Fail,
    /// Proceed without the lock.
    Proceed,
}

/// Options for one send call.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub targeting: Targeting,
    /// Skip the lowest-indexed pane (conventionally the operator's shell).
    pub skip_first: bool,
    pub dry_run: bool,
    /// Strict preflight: warnings block.
    pub strict: bool,
    /// Overrides the configured redaction mode.
    pub redaction: Option<RedactionMode>,
    pub smart_routing: bool,
    /// Base prompt from the command line (highest priority source).
    pub base_prompt: Option<String>,
    /// Base prompt file from the command line.
    pub base_prompt_file: Option<PathBuf>,
    /// File patterns to reserve before fan-out.
    pub reserve_patterns: Vec<String>,
    pub reserve_exclusive: bool,
    pub reservation_policy: ReservationPolicy,
}

/// Outcome of a send call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReport {
    pub session: String,
    /// Session-local indices actually targeted.
    pub targets: Vec<usize>,
    pub delivered: usize,
    pub failed: usize,
    /// The prompt text that was (or would be) sent, post-redaction.
    pub final_prompt: String,
    /// Redaction category counts (warn/redact modes).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub redaction_summary: Vec<(String, usize)>,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

pub struct Dispatcher {
    mux: Arc<dyn Mux>,
    lifecycle: Arc<LifecycleController>,
    reservations: Arc<ReservationTable>,
    history: Arc<HistoryStore>,
    bus: Arc<EventBus>,
    config: Arc<Config>,
}

impl Dispatcher {
    pub fn new(
        mux: Arc<dyn Mux>,
        lifecycle: Arc<LifecycleController>,
        reservations: Arc<ReservationTable>,
        history: Arc<HistoryStore>,
        bus: Arc<EventBus>,
        config: Arc<Config>,
    ) -> Self {
        Self { mux, lifecycle, reservations, history, bus, config }
    }

    /// Send one prompt per the options. See the module docs for pipeline
    /// order.
    pub async fn send(
        &self,
        name: &SessionName,
        prompt: &str,
        options: &SendOptions,
    ) -> Result<SendReport> {
        let session = name.full();
        let mut warnings: Vec<String> = Vec::new();

        // 1. Base-prompt resolution.
        let combined = self.resolve_base_prompt(options)?.map_or_else(
            || prompt.to_owned(),
            |base| format!("{base}\n\n{prompt}"),
        );

        // 2. Preflight lint.
        let report = preflight::run(&combined, options.strict);
        if report.is_blocked() {
            return Err(NtmError::PreflightBlocked(report.blocking()));
        }
        for finding in &report.findings {
            warnings.push(format!("preflight {}: {}", finding.rule, finding.message));
        }

        // 3. Redaction policy.
        let mode = options.redaction.unwrap_or(self.config.redaction.mode);
        let (text, redaction_summary) = match mode {
            RedactionMode::Off => (combined, vec![]),
            RedactionMode::Warn => {
                let scan = redactor().apply(&combined, RedactionMode::Warn);
                let summary = scan.summary();
                for (category, count) in &summary {
                    warnings.push(format!("secret detected: {category}={count}"));
                }
                (combined, summary)
            }
            RedactionMode::Redact => {
                let scan = redactor().apply(&combined, RedactionMode::Redact);
                let summary = scan.summary();
                (scan.text, summary)
            }
            RedactionMode::Block => {
                let scan = redactor().apply(&combined, RedactionMode::Block);
                if !scan.findings.is_empty() {
                    return Err(NtmError::BlockedBySecret { summary: scan.summary() });
                }
                (combined, vec![])
            }
        };

        // 4. Targeting and smart routing.
        let mut targets = self.resolve_targets(&session, &options.targeting)?;
        if options.skip_first {
            if let Some(first) = targets.iter().map(|p| p.index).min() {
                targets.retain(|p| p.index != first);
            }
        }
        if options.smart_routing
            && !matches!(options.targeting, Targeting::Panes(_))
            && targets.len() > 1
        {
            let candidates: Vec<PaneCandidate> = targets
                .iter()
                .map(|record| {
                    let state = self.lifecycle.last_state(&record.id);
                    PaneCandidate {
                        index: record.index,
                        agent: record.agent,
                        idle: state.as_ref().is_some_and(|s| s.is_idle),
                        rate_limited: state.as_ref().is_some_and(|s| s.is_rate_limited),
                        in_error: state.as_ref().is_some_and(|s| s.is_in_error),
                    }
                })
                .collect();
            if let Some(best) = route::pick_best(&text, &candidates) {
                debug!(session, pane = best, "smart routing selected single target");
                targets.retain(|p| p.index == best);
            }
        }
        if targets.is_empty() {
            return Err(NtmError::NotFound(format!(
                "no matching panes in session {session}"
            )));
        }
        let target_indices: Vec<usize> = targets.iter().map(|p| p.index).collect();

        // 5. Reservations.
        let mut held: Vec<String> = Vec::new();
        for pattern in &options.reserve_patterns {
            let acquired = self.reservations.acquire(
                name.base(),
                &format!("{session}:send"),
                pattern,
                options.reserve_exclusive,
                "prompt dispatch",
                Duration::minutes(15),
            );
            match acquired {
                Ok(r) => {
                    held.push(r.id.clone());
                    self.bus.publish_sync(Event::new(
                        EventKind::ReservationGranted,
                        Some(&session),
                        serde_json::json!({ "pattern": pattern, "id": r.id }),
                    ));
                }
                Err(e) => match options.reservation_policy {
                    ReservationPolicy::Fail => return Err(e),
                    ReservationPolicy::Proceed => {
                        warnings.push(format!("proceeding without reservation: {e}"));
                    }
                },
            }
        }

        // 6. Dry run stops here.
        if options.dry_run {
            for id in &held {
                self.reservations.release(id);
            }
            return Ok(SendReport {
                session,
                targets: target_indices,
                delivered: 0,
                failed: 0,
                final_prompt: text,
                redaction_summary,
                dry_run: true,
                warnings,
            });
        }

        // 7. Fan-out.
        let mut delivered = 0;
        let mut failed = 0;
        for record in &targets {
            match self.mux.send_keys(&record.id, &text, true).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(pane = %record.id, error = %e, "send_keys failed");
                    failed += 1;
                }
            }
        }

        let success = failed == 0;
        let entry = HistoryEntry::new(&session, target_indices.clone(), &text, success);
        if let Err(e) = self.history.append(entry) {
            warnings.push(format!("history append failed: {e}"));
        }

        self.bus.publish_sync(Event::new(
            EventKind::SendDispatched,
            Some(&session),
            serde_json::json!({
                "targets": target_indices,
                "delivered": delivered,
                "failed": failed,
            }),
        ));

        self.run_post_send_hook(&session, &target_indices, delivered, failed, &mut warnings)
            .await;

        Ok(SendReport {
            session,
            targets: target_indices,
            delivered,
            failed,
            final_prompt: text,
            redaction_summary,
            dry_run: false,
            warnings,
        })
    }

    /// Send a parsed batch: stable priority order, one send per prompt.
    pub async fn send_batch(
        &self,
        name: &SessionName,
        mut prompts: Vec<batch::BatchPrompt>,
        options: &SendOptions,
    ) -> Result<Vec<SendReport>> {
        batch::sort_by_priority(&mut prompts);
        let mut reports = Vec::with_capacity(prompts.len());
        for prompt in &prompts {
            reports.push(self.send(name, &prompt.text, options).await?);
        }
        Ok(reports)
    }

    /// Effective base prompt: CLI flag > CLI file > config value > config
    /// file. A named-but-missing file is a hard error.
    fn resolve_base_prompt(&self, options: &SendOptions) -> Result<Option<String>> {
        if let Some(base) = &options.base_prompt {
            return Ok(Some(base.clone()));
        }
        if let Some(path) = &options.base_prompt_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                NtmError::Validation(format!(
                    "base prompt file {}: {e}",
                    path.display()
                ))
            })?;
            return Ok(Some(contents.trim_end().to_owned()));
        }
        if let Some(base) = &self.config.base_prompt {
            return Ok(Some(base.clone()));
        }
        if let Some(path) = &self.config.base_prompt_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                NtmError::Validation(format!(
                    "configured base prompt file {}: {e}",
                    path.display()
                ))
            })?;
            return Ok(Some(contents.trim_end().to_owned()));
        }
        Ok(None)
    }

    fn resolve_targets(
        &self,
        session: &str,
        targeting: &Targeting,
    ) -> Result<Vec<PaneRecord>> {
        let all = self.lifecycle.panes_in(session);
        if all.is_empty() {
            return Err(NtmError::NotFound(format!(
                "no panes recorded for session {session}"
            )));
        }
        let selected: Vec<PaneRecord> = match targeting {
            Targeting::All => all,
            Targeting::Agents => all.into_iter().filter(|p| p.agent.is_agent()).collect(),
            Targeting::Types(types) => {
                all.into_iter().filter(|p| types.contains(&p.agent)).collect()
            }
            Targeting::Panes(indices) => {
                let selected: Vec<PaneRecord> = all
                    .into_iter()
                    .filter(|p| indices.contains(&p.index))
                    .collect();
                if selected.len() != indices.len() {
                    return Err(NtmError::NotFound(format!(
                        "pane indices {indices:?} not all present in {session}"
                    )));
                }
                selected
            }
            Targeting::Tags(tags) => all
                .into_iter()
                .filter(|p| tags.iter().any(|t| p.tags.contains(t)))
                .collect(),
        };
        Ok(selected)
    }

    /// Run the configured post-send hook with the `NTM_*` environment.
    /// Hook failures become warnings; they never mask a successful send.
    async fn run_post_send_hook(
        &self,
        session: &str,
        targets: &[usize],
        delivered: usize,
        failed: usize,
        warnings: &mut Vec<String>,
    ) {
        let Some(hook) = &self.config.post_send_hook else {
            return;
        };
        let target_list =
            targets.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg(hook)
            .env("NTM_SESSION", session)
            .env("NTM_DELIVERED_COUNT", delivered.to_string())
            .env("NTM_FAILED_COUNT", failed.to_string())
            .env("NTM_SEND_TARGETS", &target_list);
        for (slot, index) in targets.iter().enumerate() {
            command.env(format!("NTM_TARGET_{slot}"), index.to_string());
        }
        if let [only] = targets {
            command.env("NTM_PANE_INDEX", only.to_string());
        }
        match command.status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warnings.push(format!("post-send hook exited with {status}")),
            Err(e) => warnings.push(format!("post-send hook failed to start: {e}")),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
