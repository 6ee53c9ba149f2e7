// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::mux::{Mux, MuxCall, MuxError, PaneId};

use super::FakeMux;

#[tokio::test]
async fn session_and_pane_lifecycle() -> anyhow::Result<()> {
    let mux = FakeMux::new();
    mux.create_session("proj", "/tmp/proj").await?;
    let pane = mux.split_pane("proj", "/tmp/proj", "claude").await?;
    assert_eq!(pane.index, 0);

    let panes = mux.list_panes("proj").await?;
    assert_eq!(panes.len(), 1);

    mux.kill_session("proj").await?;
    assert!(mux.list_panes("proj").await.is_err());
    Ok(())
}

#[tokio::test]
async fn send_keys_builds_transcript_and_capture_replays_it() -> anyhow::Result<()> {
    let mux = FakeMux::new();
    mux.create_session("proj", "/tmp").await?;
    let pane = mux.split_pane("proj", "/tmp", "claude").await?;

    mux.send_keys(&pane.id, "hello", true).await?;
    mux.send_keys(&pane.id, "world", true).await?;

    assert_eq!(mux.transcript(&pane.id), vec!["hello", "world"]);
    assert_eq!(mux.capture(&pane.id, 100).await?, "hello\nworld");
    Ok(())
}

#[tokio::test]
async fn scripted_capture_wins_over_transcript() -> anyhow::Result<()> {
    let mux = FakeMux::new();
    let pane = mux.seed_pane("proj", "t", "claude");
    mux.script_capture(&pane, "codex> ");
    assert_eq!(mux.capture(&pane, 10).await?, "codex> ");
    Ok(())
}

#[tokio::test]
async fn pipe_unsupported_reports_unavailable() {
    let mux = FakeMux::new();
    let pane = mux.seed_pane("proj", "t", "claude");
    mux.set_pipe_unsupported(true);
    assert!(matches!(
        mux.pipe_to_fifo(&pane, "/tmp/x.fifo").await,
        Err(MuxError::Unavailable(_))
    ));
}

#[tokio::test]
async fn unknown_pane_is_not_found() {
    let mux = FakeMux::new();
    let ghost = PaneId("%99".to_owned());
    assert!(matches!(
        mux.send_keys(&ghost, "x", false).await,
        Err(MuxError::NotFound(_))
    ));
}

#[tokio::test]
async fn fail_all_and_heal() -> anyhow::Result<()> {
    let mux = FakeMux::new();
    mux.fail_all("socket hiccup");
    assert!(matches!(
        mux.create_session("proj", "/tmp").await,
        Err(MuxError::Transient(_))
    ));
    mux.heal();
    mux.create_session("proj", "/tmp").await?;
    Ok(())
}

#[tokio::test]
async fn calls_are_recorded_in_order() -> anyhow::Result<()> {
    let mux = FakeMux::new();
    mux.create_session("proj", "/tmp").await?;
    let pane = mux.split_pane("proj", "/tmp", "codex").await?;
    mux.send_interrupt(&pane.id).await?;

    let calls = mux.calls();
    assert!(matches!(calls[0], MuxCall::CreateSession { .. }));
    assert!(matches!(calls[1], MuxCall::SplitPane { .. }));
    assert!(matches!(calls[2], MuxCall::SendInterrupt { .. }));
    Ok(())
}
