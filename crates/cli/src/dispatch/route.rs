// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Smart routing: pick the pane whose agent best fits the prompt.
//!
//! Heuristic by design — the one hard property is that explicit pane
//! selection bypasses scoring entirely (enforced by the dispatcher, which
//! never calls into this module when panes were named).

use crate::agent::AgentType;

/// Coarse classification of what a prompt is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    CodeWrite,
    Debug,
    Test,
    Docs,
    Shell,
    General,
}

/// Keyword classes checked in order; first hit wins.
const TASK_KEYWORDS: &[(TaskKind, &[&str])] = &[
    (TaskKind::Debug, &["debug", "fix", "bug", "crash", "stack trace", "panic"]),
    (TaskKind::Test, &["test", "coverage", "assert", "spec"]),
    (TaskKind::Docs, &["document", "docs", "readme", "comment", "explain"]),
    (TaskKind::Shell, &["run ", "shell", "command", "install", "deploy"]),
    (
        TaskKind::CodeWrite,
        &["implement", "write", "create", "refactor", "add ", "build"],
    ),
];

pub fn classify_task(prompt: &str) -> TaskKind {
    let lower = prompt.to_lowercase();
    for (kind, keywords) in TASK_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *kind;
        }
    }
    TaskKind::General
}

/// A pane under consideration for routing.
#[derive(Debug, Clone)]
pub struct PaneCandidate {
    pub index: usize,
    pub agent: AgentType,
    pub idle: bool,
    pub rate_limited: bool,
    pub in_error: bool,
}

/// Primary/secondary task affinity per agent type.
fn affinity(agent: AgentType, kind: TaskKind) -> i32 {
    let (primary, secondary): (&[TaskKind], &[TaskKind]) = match agent {
        AgentType::Claude => (
            &[TaskKind::CodeWrite, TaskKind::Debug],
            &[TaskKind::Docs, TaskKind::Test],
        ),
        AgentType::Codex => (
            &[TaskKind::CodeWrite, TaskKind::Test],
            &[TaskKind::Debug, TaskKind::Shell],
        ),
        AgentType::Gemini => (&[TaskKind::Docs], &[TaskKind::CodeWrite, TaskKind::Debug]),
        AgentType::Aider => (&[TaskKind::CodeWrite], &[TaskKind::Debug]),
        AgentType::Cursor | AgentType::Windsurf => (&[TaskKind::CodeWrite], &[TaskKind::Test]),
        AgentType::Ollama => (&[], &[TaskKind::Docs]),
        AgentType::User => (&[TaskKind::Shell], &[]),
        AgentType::Unknown => (&[], &[]),
    };
    if primary.contains(&kind) {
        3
    } else if secondary.contains(&kind) {
        1
    } else {
        0
    }
}

/// Score one candidate for the classified task.
pub fn score(kind: TaskKind, candidate: &PaneCandidate) -> i32 {
    let mut score = affinity(candidate.agent, kind);
    if candidate.idle {
        score += 2;
    }
    if candidate.rate_limited || candidate.in_error {
        score -= 3;
    }
    score
}

/// Pick the best single target. Ties resolve to the lowest pane index so
/// routing is deterministic.
pub fn pick_best(prompt: &str, candidates: &[PaneCandidate]) -> Option<usize> {
    let kind = classify_task(prompt);
    candidates
        .iter()
        .map(|c| (score(kind, c), c.index))
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, index)| index)
}

#[cfg(test)]
#[path = "route_tests.rs"]
mod tests;
