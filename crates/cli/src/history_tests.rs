// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{Duration, Utc};

use crate::config::Config;

use super::{HistoryEntry, HistoryStore};

fn store(dir: &std::path::Path) -> HistoryStore {
    HistoryStore::new(dir.to_path_buf(), &Config::default())
}

#[test]
fn append_and_read_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store(dir.path());

    store.append(HistoryEntry::new("proj", vec![0, 2], "first prompt", true))?;
    store.append(HistoryEntry::new("proj", vec![1], "second prompt", false))?;

    let entries = store.read("proj");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].prompt, "first prompt");
    assert_eq!(entries[0].targets, vec![0, 2]);
    assert!(entries[0].success);
    assert!(!entries[1].success);
    Ok(())
}

#[test]
fn sessions_are_isolated() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store(dir.path());
    store.append(HistoryEntry::new("alpha", vec![0], "to alpha", true))?;
    store.append(HistoryEntry::new("beta", vec![0], "to beta", true))?;

    assert_eq!(store.read("alpha").len(), 1);
    assert_eq!(store.read("beta").len(), 1);
    assert!(store.read("gamma").is_empty());
    Ok(())
}

#[test]
fn secrets_are_redacted_on_the_write_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    // Default mode is `warn`, which collapses to redact for persistence.
    let store = store(dir.path());
    store.append(HistoryEntry::new("proj", vec![0], "password=hunter2hunter2", true))?;

    let raw = std::fs::read_to_string(dir.path().join("proj.jsonl"))?;
    assert!(!raw.contains("hunter2hunter2"));
    assert!(raw.contains("[REDACTED:PASSWORD:"));
    Ok(())
}

#[test]
fn retention_window_prunes_old_entries() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store(dir.path());

    let mut old = HistoryEntry::new("proj", vec![0], "ancient", true);
    old.timestamp = Utc::now() - Duration::hours(24 * 365);
    store.append(old)?;
    store.append(HistoryEntry::new("proj", vec![0], "recent", true))?;

    let entries = store.read("proj");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].prompt, "recent");
    Ok(())
}
