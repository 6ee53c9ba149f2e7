// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable checkpoint store for ensemble runs.
//!
//! Layout: `<root>/<runID>/metadata.json` plus one `<modeID>.out` artifact
//! per completed mode. Metadata is written to a temp file and renamed, so a
//! crash leaves either the old or the new version, never a torn one.
//! Readers tolerate the missing-then-present window by retrying once.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NtmError, Result};
use crate::redact::{redactor, RedactionMode};

/// Per-run durable metadata. The three id lists partition the preset's
/// modes: a mode id appears in exactly one list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub run_id: String,
    pub session_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_ids: Vec<String>,
    pub pending_ids: Vec<String>,
    pub error_ids: Vec<String>,
}

impl Metadata {
    pub fn new(run_id: &str, session_name: &str, mode_ids: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.to_owned(),
            session_name: session_name.to_owned(),
            created_at: now,
            updated_at: now,
            completed_ids: vec![],
            pending_ids: mode_ids,
            error_ids: vec![],
        }
    }

    /// Check the partition invariant: no mode id in two lists.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for id in self
            .completed_ids
            .iter()
            .chain(&self.pending_ids)
            .chain(&self.error_ids)
        {
            if !seen.insert(id) {
                return Err(NtmError::Fatal(format!(
                    "checkpoint {}: mode {id:?} appears in two status lists",
                    self.run_id
                )));
            }
        }
        Ok(())
    }

    /// Move a mode id into the given list, removing it from the others.
    pub fn transition(&mut self, mode_id: &str, into: ModeList) {
        self.completed_ids.retain(|m| m != mode_id);
        self.pending_ids.retain(|m| m != mode_id);
        self.error_ids.retain(|m| m != mode_id);
        let list = match into {
            ModeList::Completed => &mut self.completed_ids,
            ModeList::Pending => &mut self.pending_ids,
            ModeList::Error => &mut self.error_ids,
        };
        list.push(mode_id.to_owned());
        self.updated_at = Utc::now();
    }
}

/// Target list for a metadata transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeList {
    Completed,
    Pending,
    Error,
}

/// Report from a cleanup pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanReport {
    pub removed: usize,
    pub kept: usize,
    pub dry_run: bool,
}

/// File-backed checkpoint store rooted at `~/.ntm/ensembles`.
pub struct CheckpointStore {
    root: PathBuf,
    redaction: RedactionMode,
}

impl CheckpointStore {
    pub fn new(root: PathBuf, redaction: RedactionMode) -> Self {
        Self { root, redaction }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    fn metadata_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("metadata.json")
    }

    /// Persist metadata atomically (temp file + rename).
    pub fn save_metadata(&self, metadata: &Metadata) -> Result<()> {
        metadata.validate()?;
        let dir = self.run_dir(&metadata.run_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| NtmError::Transient(format!("checkpoint dir: {e}")))?;

        let path = self.metadata_path(&metadata.run_id);
        let tmp = dir.join("metadata.json.tmp");
        let body = serde_json::to_vec_pretty(metadata)
            .map_err(|e| NtmError::Fatal(format!("metadata encode: {e}")))?;
        std::fs::write(&tmp, body)
            .map_err(|e| NtmError::Transient(format!("metadata write: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| NtmError::Transient(format!("metadata rename: {e}")))?;
        Ok(())
    }

    /// Load metadata, retrying once across the missing-then-present window.
    pub fn load_metadata(&self, run_id: &str) -> Result<Metadata> {
        match self.try_load_metadata(run_id) {
            Err(NtmError::NotFound(_)) => {
                std::thread::sleep(std::time::Duration::from_millis(50));
                self.try_load_metadata(run_id)
            }
            other => other,
        }
    }

    fn try_load_metadata(&self, run_id: &str) -> Result<Metadata> {
        let path = self.metadata_path(run_id);
        let contents = std::fs::read_to_string(&path)
            .map_err(|_| NtmError::NotFound(format!("checkpoint run {run_id} not found")))?;
        let metadata: Metadata = serde_json::from_str(&contents)
            .map_err(|e| NtmError::Fatal(format!("checkpoint {run_id} corrupt: {e}")))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Persist one mode's output artifact, redacted on the write path.
    pub fn save_mode_output(&self, run_id: &str, mode_id: &str, output: &str) -> Result<()> {
        let dir = self.run_dir(run_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| NtmError::Transient(format!("checkpoint dir: {e}")))?;
        let redacted = redactor().apply(output, self.redaction.for_write_path()).text;
        std::fs::write(dir.join(format!("{mode_id}.out")), redacted)
            .map_err(|e| NtmError::Transient(format!("artifact write: {e}")))?;
        Ok(())
    }

    /// Read a mode's artifact if present.
    pub fn load_mode_output(&self, run_id: &str, mode_id: &str) -> Option<String> {
        std::fs::read_to_string(self.run_dir(run_id).join(format!("{mode_id}.out"))).ok()
    }

    /// Delete a mode's artifact (single-mode rerun).
    pub fn discard_mode_output(&self, run_id: &str, mode_id: &str) {
        let _ = std::fs::remove_file(self.run_dir(run_id).join(format!("{mode_id}.out")));
    }

    /// Persist an auxiliary JSON document in the run directory (session
    /// record, provenance). Same temp-file + rename discipline as metadata.
    pub fn save_json<T: serde::Serialize>(
        &self,
        run_id: &str,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let dir = self.run_dir(run_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| NtmError::Transient(format!("checkpoint dir: {e}")))?;
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| NtmError::Fatal(format!("{name} encode: {e}")))?;
        let tmp = dir.join(format!("{name}.json.tmp"));
        std::fs::write(&tmp, body)
            .map_err(|e| NtmError::Transient(format!("{name} write: {e}")))?;
        std::fs::rename(&tmp, dir.join(format!("{name}.json")))
            .map_err(|e| NtmError::Transient(format!("{name} rename: {e}")))?;
        Ok(())
    }

    /// Load an auxiliary JSON document saved by [`CheckpointStore::save_json`].
    pub fn load_json<T: serde::de::DeserializeOwned>(
        &self,
        run_id: &str,
        name: &str,
    ) -> Result<T> {
        let path = self.run_dir(run_id).join(format!("{name}.json"));
        let contents = std::fs::read_to_string(&path).map_err(|_| {
            NtmError::NotFound(format!("{name} for run {run_id} not found"))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| NtmError::Fatal(format!("{name} for run {run_id} corrupt: {e}")))
    }

    /// All run ids on disk, newest metadata first.
    pub fn list_runs(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return vec![];
        };
        let mut runs: Vec<(String, DateTime<Utc>)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                let run_id = e.file_name().to_string_lossy().into_owned();
                let metadata = self.try_load_metadata(&run_id).ok()?;
                Some((run_id, metadata.updated_at))
            })
            .collect();
        runs.sort_by(|a, b| b.1.cmp(&a.1));
        runs.into_iter().map(|(id, _)| id).collect()
    }

    /// Remove runs older than `max_age` (by `updated_at`, falling back to
    /// `created_at`), or all runs. `dry_run` reports counts only.
    pub fn clean(
        &self,
        max_age: Option<Duration>,
        all: bool,
        dry_run: bool,
    ) -> Result<CleanReport> {
        let now = Utc::now();
        let mut report = CleanReport { dry_run, ..CleanReport::default() };

        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Ok(report);
        };
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.path().is_dir() {
                continue;
            }
            let run_id = entry.file_name().to_string_lossy().into_owned();
            let remove = if all {
                true
            } else if let Some(max_age) = max_age {
                match self.try_load_metadata(&run_id) {
                    Ok(metadata) => {
                        let stamp = if metadata.updated_at > metadata.created_at {
                            metadata.updated_at
                        } else {
                            metadata.created_at
                        };
                        now - stamp > max_age
                    }
                    // Unreadable metadata: age by directory mtime is not
                    // durable; leave the run alone.
                    Err(_) => false,
                }
            } else {
                false
            };

            if remove {
                report.removed += 1;
                if !dry_run {
                    std::fs::remove_dir_all(entry.path())
                        .map_err(|e| NtmError::Transient(format!("clean {run_id}: {e}")))?;
                }
            } else {
                report.kept += 1;
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
