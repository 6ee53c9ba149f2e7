// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios over the full control plane with a fake
//! multiplexer.

use std::time::Duration;

use ntm::agent::AgentType;
use ntm::config::ParserConfig;
use ntm::dispatch::{batch, SendOptions};
use ntm::ensemble::checkpoint::{CheckpointStore, Metadata};
use ntm::ensemble::preset;
use ntm::error::ErrorKind;
use ntm::lifecycle::SpawnSpec;
use ntm::naming::SessionName;
use ntm::parser::{Parser, Recommendation};
use ntm::redact::RedactionMode;

use ntm_specs::SpecHarness;

#[test]
fn parser_extracts_codex_context_and_idleness() {
    let parser = Parser::new(&ParserConfig::default());
    let input = "Processing your request...\n\
                 Token usage: total=150,000 input=140,000 output=10,000\n\
                 47% context left \u{b7} ? for shortcuts\n\
                 codex> ";

    let state = parser.parse(input.as_bytes());
    assert_eq!(state.agent, AgentType::Codex);
    assert_eq!(state.context_remaining, Some(47.0));
    assert_eq!(state.tokens_used, Some(150_000));
    assert!(state.is_idle);
    assert!(!state.is_context_low);
}

#[test]
fn parser_flags_low_context_while_working() {
    let parser = Parser::new(&ParserConfig::default());
    let input = "5% context left \u{b7} ? for shortcuts\n\
                 Reviewing the module\n\
                 Writing file.go...\n\
                 ```go\nfunc example() {}\n```";

    let state = parser.parse(input.as_bytes());
    assert!(state.is_working);
    assert!(state.is_context_low);
    assert_eq!(state.recommendation, Some(Recommendation::ContextLowContinue));
}

#[test]
fn batch_priorities_sort_stably_with_unset_last() {
    let content = "# priority: 0\nCritical fix\n---\n# priority: 2\nMedium task\n---\nNo priority\n";
    let mut prompts = batch::parse(content).unwrap();

    assert_eq!(
        prompts.iter().map(|p| p.priority).collect::<Vec<_>>(),
        vec![Some(0), Some(2), None]
    );
    batch::sort_by_priority(&mut prompts);
    assert_eq!(
        prompts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(),
        vec!["Critical fix", "Medium task", "No priority"]
    );
}

#[tokio::test]
#[serial_test::serial]
async fn redaction_block_refuses_send_and_leaks_nothing() -> anyhow::Result<()> {
    let harness = SpecHarness::new()?;
    let name = SessionName::parse("proj")?;

    let report = harness
        .runtime
        .lifecycle
        .spawn(
            SpawnSpec {
                name: name.clone(),
                counts: vec![(AgentType::Claude, 1)],
                working_dir: "/tmp/proj".to_owned(),
                dry_run: false,
            },
            &harness.runtime.shutdown,
        )
        .await?;
    let pane = report.panes[0].id.clone();

    let options = SendOptions {
        redaction: Some(RedactionMode::Block),
        ..SendOptions::default()
    };
    let err = harness
        .runtime
        .dispatcher
        .send(&name, "prefix password=hunter2hunter2 suffix", &options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BlockedBySecret);
    assert!(err.to_string().contains("PASSWORD=1"));
    let capture = harness.runtime.mux.capture(&pane, 200).await?;
    assert!(!capture.contains("hunter2hunter2"));
    assert!(harness.mux.transcript(&pane).is_empty());

    harness.runtime.stop().await;
    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn ensemble_stop_is_idempotent() -> anyhow::Result<()> {
    let harness = SpecHarness::new()?;
    let council = preset::resolve("council")?;

    let run_id = harness
        .runtime
        .ensemble
        .start("is the scheduler fair?", &council, &harness.runtime.shutdown)
        .await?;

    let first = harness.runtime.ensemble.stop(&run_id, true, true).await?;
    assert!(first.success);
    assert_eq!(first.final_status, "stopped");
    assert!(first.stopped > 0);

    let calls_before = harness.mux.calls().len();
    let second = harness.runtime.ensemble.stop(&run_id, true, true).await?;
    assert!(second.success);
    assert_eq!(second.final_status, "stopped");
    assert_eq!(second.stopped, 0);
    // No interrupt or kill traffic on the second stop.
    assert_eq!(harness.mux.calls().len(), calls_before);

    harness.runtime.stop().await;
    Ok(())
}

#[test]
fn checkpoint_cleanup_dry_run_reports_without_deleting() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = CheckpointStore::new(dir.path().to_path_buf(), RedactionMode::Warn);

    for (run_id, age_hours) in [("r-30h", 30), ("r-200h", 200), ("r-300h", 300)] {
        let mut metadata =
            Metadata::new(run_id, "proj", vec!["deductive".to_owned()]);
        metadata.created_at = chrono::Utc::now() - chrono::Duration::hours(age_hours);
        metadata.updated_at = metadata.created_at;
        store.save_metadata(&metadata)?;
    }

    let report = store.clean(Some(chrono::Duration::hours(168)), false, true)?;
    assert_eq!(report.removed, 2);
    assert!(report.dry_run);
    assert_eq!(store.list_runs().len(), 3, "dry run must not delete");

    Ok(())
}

#[tokio::test]
#[serial_test::serial]
async fn spawn_send_interrupt_kill_round_trip() -> anyhow::Result<()> {
    let harness = SpecHarness::new()?;
    let name = SessionName::new("proj", Some("e2e"))?;

    let report = harness
        .runtime
        .lifecycle
        .spawn(
            SpawnSpec {
                name: name.clone(),
                counts: vec![(AgentType::Claude, 2), (AgentType::User, 1)],
                working_dir: "/tmp/proj".to_owned(),
                dry_run: false,
            },
            &harness.runtime.shutdown,
        )
        .await?;
    assert_eq!(report.session, "proj--e2e");
    assert_eq!(report.panes.len(), 3);

    let send = harness
        .runtime
        .dispatcher
        .send(&name, "hello fleet", &SendOptions::default())
        .await?;
    assert_eq!(send.delivered, 2, "agents only, not the user shell");

    let interrupted = harness.runtime.lifecycle.interrupt(&name).await?;
    assert_eq!(interrupted, 2);

    harness
        .runtime
        .lifecycle
        .kill(&name, true, Duration::from_millis(10))
        .await?;
    assert!(harness.runtime.mux.list_sessions().await?.is_empty());

    harness.runtime.stop().await;
    Ok(())
}
