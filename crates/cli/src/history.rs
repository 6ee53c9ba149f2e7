// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-session send history.
//!
//! Entries are JSONL under `~/.ntm/history/<session>.jsonl`. Prompts pass
//! the redactor on the write path (warn/block collapse to redact), so
//! secrets never reach disk; reads are returned as stored. Appends prune
//! entries older than the retention window.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{Config, HistoryConfig};
use crate::redact::{redactor, RedactionMode};

/// One recorded send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub session: String,
    /// Pane indices the send targeted.
    pub targets: Vec<usize>,
    pub prompt: String,
    pub success: bool,
}

impl HistoryEntry {
    pub fn new(session: &str, targets: Vec<usize>, prompt: &str, success: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session: session.to_owned(),
            targets,
            prompt: prompt.to_owned(),
            success,
        }
    }
}

/// File-backed history store.
pub struct HistoryStore {
    dir: PathBuf,
    retention: HistoryConfig,
    mode: RedactionMode,
}

impl HistoryStore {
    pub fn new(dir: PathBuf, config: &Config) -> Self {
        Self {
            dir,
            retention: config.history.clone(),
            mode: config.redaction.mode,
        }
    }

    fn path_for(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{session}.jsonl"))
    }

    /// Append an entry, redacting the prompt on the write path and pruning
    /// entries past the retention window.
    pub fn append(&self, mut entry: HistoryEntry) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let write_mode = self.mode.for_write_path();
        entry.prompt = redactor().apply(&entry.prompt, write_mode).text;

        let path = self.path_for(&entry.session);
        let cutoff = Utc::now() - Duration::hours(self.retention.retention_hours as i64);

        let mut kept: Vec<HistoryEntry> = self
            .read(&entry.session)
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect();
        kept.push(entry);

        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            for e in &kept {
                let line = serde_json::to_string(e)?;
                writeln!(file, "{line}")?;
            }
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// All stored entries for a session, oldest first. Reads are not
    /// redacted.
    pub fn read(&self, session: &str) -> Vec<HistoryEntry> {
        let Ok(contents) = std::fs::read_to_string(self.path_for(session)) else {
            return vec![];
        };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
