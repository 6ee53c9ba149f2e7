// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::agent::AgentType;
use crate::bus::EventBus;
use crate::config::Config;
use crate::dispatch::reservation::ReservationTable;
use crate::dispatch::Dispatcher;
use crate::history::HistoryStore;
use crate::lifecycle::LifecycleController;
use crate::mux::{FakeMux, Mux, MuxCall, PaneId};
use crate::parser::Parser;
use crate::redact::RedactionMode;
use crate::scheduler::headroom::{HeadroomSnapshot, ResourceProbe};
use crate::scheduler::SpawnScheduler;
use crate::stream::StreamManager;

use super::checkpoint::CheckpointStore;
use super::preset::{self, Budget, Mode, Preset, SynthesisStrategy};
use super::synthesize::OutputFormat;
use super::{AssignmentStatus, EnsembleCoordinator, RunStatus};

struct HealthyProbe;

impl ResourceProbe for HealthyProbe {
    fn sample(&self) -> anyhow::Result<HeadroomSnapshot> {
        Ok(HeadroomSnapshot {
            free_mem_mb: 8192,
            free_disk_mb: 100_000,
            load1: 0.1,
            open_fds: 32,
        })
    }
}

struct Fixture {
    mux: Arc<FakeMux>,
    coordinator: Arc<EnsembleCoordinator>,
    shutdown: CancellationToken,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

fn fixture() -> Fixture {
    let mut config = Config::default();
    config.scheduler.ramp_up_delay_ms = 0;
    config.scheduler.rate_per_sec = 1000.0;
    config.scheduler.burst_size = 1000.0;
    config.scheduler.max_spawns_per_sec = 1000.0;
    config.scheduler.global_burst_size = 1000.0;
    config.scheduler.max_concurrent = 16;
    config.scheduler.max_concurrent_spawns = 32;
    config.stream.fallback_poll_interval_ms = 20;
    config.stream.flush_interval_ms = 20;
    let config = Arc::new(config);

    let mux = Arc::new(FakeMux::new());
    mux.set_pipe_unsupported(true);
    let bus = EventBus::new(1024);
    let scheduler = SpawnScheduler::new(
        config.scheduler.clone(),
        Arc::clone(&bus),
        Box::new(HealthyProbe),
    );
    let (streams, rx) =
        StreamManager::new(Arc::clone(&mux) as Arc<dyn Mux>, config.stream.clone(), 256);
    let lifecycle = Arc::new(LifecycleController::new(
        Arc::clone(&mux) as Arc<dyn Mux>,
        scheduler,
        Arc::new(streams),
        Arc::clone(&bus),
        Arc::clone(&config),
    ));

    let shutdown = CancellationToken::new();
    lifecycle.attach_detection(
        rx,
        Parser::new(&config.parser),
        shutdown.clone(),
    );

    let history_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let history = Arc::new(HistoryStore::new(history_dir.path().to_path_buf(), &config));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&mux) as Arc<dyn Mux>,
        Arc::clone(&lifecycle),
        Arc::new(ReservationTable::new()),
        history,
        Arc::clone(&bus),
        Arc::clone(&config),
    ));
    let store =
        CheckpointStore::new(store_dir.path().to_path_buf(), RedactionMode::Warn);
    let coordinator = Arc::new(EnsembleCoordinator::new(
        Arc::clone(&mux) as Arc<dyn Mux>,
        lifecycle,
        dispatcher,
        bus,
        store,
        config,
    ));

    Fixture {
        mux,
        coordinator,
        shutdown,
        _dirs: (history_dir, store_dir),
    }
}

fn quick_preset(timeout_ms: u64) -> Preset {
    Preset {
        name: "council".to_owned(),
        modes: vec![
            Mode {
                id: "deductive".to_owned(),
                code: "DED".to_owned(),
                agent: AgentType::Claude,
                prompt_template: "Deductive take on {question}".to_owned(),
            },
            Mode {
                id: "adversarial".to_owned(),
                code: "ADV".to_owned(),
                agent: AgentType::Codex,
                prompt_template: "Adversarial take on {question}".to_owned(),
            },
        ],
        budget: Budget { mode_timeout_ms: timeout_ms, ..Budget::default() },
        strategy: SynthesisStrategy::Consensus,
    }
}

fn panes_of(f: &Fixture, run_id: &str) -> Vec<(String, PaneId)> {
    let session = f.coordinator.load_session(run_id).unwrap();
    session
        .assignments
        .iter()
        .filter_map(|a| a.pane.clone().map(|p| (a.mode_id.clone(), p)))
        .collect()
}

const VALID_OUTPUT: &str =
    "{\"findings\": [{\"text\": \"the cache misses a generation check\", \
     \"confidence\": 0.8}]}\n\u{276f} ";

#[tokio::test(start_paused = true)]
async fn start_persists_checkpoint_and_activates_assignments() {
    let f = fixture();
    let cancel = CancellationToken::new();

    let run_id = f
        .coordinator
        .start("is the cache sound?", &quick_preset(60_000), &cancel)
        .await
        .unwrap();

    let session = f.coordinator.load_session(&run_id).unwrap();
    assert_eq!(session.status, RunStatus::Running);
    assert_eq!(session.assignments.len(), 2);
    assert!(session
        .assignments
        .iter()
        .all(|a| a.status == AssignmentStatus::Active && a.pane.is_some()));

    let metadata = f.coordinator.store().load_metadata(&run_id).unwrap();
    assert_eq!(metadata.pending_ids.len(), 2);
    assert!(metadata.completed_ids.is_empty());

    // Prompts reached the panes with the question substituted.
    for (mode_id, pane) in panes_of(&f, &run_id) {
        let transcript = f.mux.transcript(&pane);
        assert_eq!(transcript.len(), 1, "mode {mode_id}");
        assert!(transcript[0].contains("is the cache sound?"));
    }
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn drive_completes_when_outputs_validate() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(120_000), &cancel)
        .await
        .unwrap();

    let driver = {
        let coordinator = Arc::clone(&f.coordinator);
        let run = run_id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.drive(&run, &cancel).await })
    };

    // Let the driver subscribe, then let each pane "finish".
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, VALID_OUTPUT);
    }

    let status = driver.await.unwrap().unwrap();
    assert_eq!(status, RunStatus::Completed);

    let metadata = f.coordinator.store().load_metadata(&run_id).unwrap();
    assert_eq!(metadata.completed_ids.len(), 2);
    assert!(metadata.pending_ids.is_empty());
    assert!(metadata.error_ids.is_empty());

    for mode_id in ["deductive", "adversarial"] {
        let artifact = f.coordinator.store().load_mode_output(&run_id, mode_id);
        assert!(artifact.is_some_and(|a| a.contains("generation check")));
    }
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn drive_times_out_stuck_modes() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(500), &cancel)
        .await
        .unwrap();

    // Panes never go idle; the per-mode timeout must fire.
    let status = f.coordinator.drive(&run_id, &cancel).await.unwrap();
    assert_eq!(status, RunStatus::Error);

    let metadata = f.coordinator.store().load_metadata(&run_id).unwrap();
    assert_eq!(metadata.error_ids.len(), 2);
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_on_terminal_runs() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(60_000), &cancel)
        .await
        .unwrap();

    let first = f.coordinator.stop(&run_id, true, true).await.unwrap();
    assert!(first.success);
    assert_eq!(first.final_status, "stopped");
    assert_eq!(first.stopped, 2);

    let calls_after_first = f.mux.calls().len();
    let second = f.coordinator.stop(&run_id, true, true).await.unwrap();
    assert!(second.success);
    assert_eq!(second.final_status, "stopped");
    assert_eq!(second.stopped, 0);
    // No further interrupt/kill traffic.
    assert_eq!(f.mux.calls().len(), calls_after_first);
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn graceful_stop_captures_partial_outputs() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(60_000), &cancel)
        .await
        .unwrap();

    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, "partial reasoning so far");
    }

    let report = f.coordinator.stop(&run_id, false, false).await.unwrap();
    assert_eq!(report.stopped, 2);

    let partial = f
        .coordinator
        .store()
        .load_mode_output(&run_id, "deductive.partial");
    assert!(partial.is_some_and(|p| p.contains("partial reasoning")));

    // Interrupts were sent before the kill.
    let calls = f.mux.calls();
    let interrupt_pos = calls
        .iter()
        .position(|c| matches!(c, MuxCall::SendInterrupt { .. }))
        .unwrap();
    let kill_pos = calls
        .iter()
        .position(|c| matches!(c, MuxCall::KillPane { .. }))
        .unwrap();
    assert!(interrupt_pos < kill_pos);
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn no_collect_skips_partial_capture() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(60_000), &cancel)
        .await
        .unwrap();

    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, "should not be saved");
    }
    f.coordinator.stop(&run_id, true, true).await.unwrap();
    assert!(f
        .coordinator
        .store()
        .load_mode_output(&run_id, "deductive.partial")
        .is_none());
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn resume_reruns_pending_and_errored_modes() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(500), &cancel)
        .await
        .unwrap();

    // Time out both modes, then resume.
    let status = f.coordinator.drive(&run_id, &cancel).await.unwrap();
    assert_eq!(status, RunStatus::Error);

    let rerun = f.coordinator.resume(&run_id, true, &cancel).await.unwrap();
    assert_eq!(rerun.len(), 2);

    let session = f.coordinator.load_session(&run_id).unwrap();
    assert_eq!(session.status, RunStatus::Running);
    assert!(session
        .assignments
        .iter()
        .all(|a| a.status == AssignmentStatus::Active));
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn resume_skips_completed_modes_by_default() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(120_000), &cancel)
        .await
        .unwrap();

    let driver = {
        let coordinator = Arc::clone(&f.coordinator);
        let run = run_id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.drive(&run, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, VALID_OUTPUT);
    }
    driver.await.unwrap().unwrap();

    // Everything completed: nothing to resume.
    let rerun = f.coordinator.resume(&run_id, true, &cancel).await.unwrap();
    assert!(rerun.is_empty());
    // Artifacts kept.
    assert!(f
        .coordinator
        .store()
        .load_mode_output(&run_id, "deductive")
        .is_some());
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn rerun_mode_by_display_code_discards_artifact() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(120_000), &cancel)
        .await
        .unwrap();

    let driver = {
        let coordinator = Arc::clone(&f.coordinator);
        let run = run_id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.drive(&run, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, VALID_OUTPUT);
    }
    driver.await.unwrap().unwrap();

    let mode_id = f.coordinator.rerun_mode(&run_id, "DED", &cancel).await.unwrap();
    assert_eq!(mode_id, "deductive");
    assert!(f
        .coordinator
        .store()
        .load_mode_output(&run_id, "deductive")
        .is_none());

    let metadata = f.coordinator.store().load_metadata(&run_id).unwrap();
    assert!(metadata.pending_ids.contains(&"deductive".to_owned()));
    assert!(metadata.completed_ids.contains(&"adversarial".to_owned()));
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn synthesize_requires_readiness_unless_forced() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(60_000), &cancel)
        .await
        .unwrap();

    // Still running: not ready.
    assert!(f.coordinator.synthesize(&run_id, None, false).is_err());
    // Forced with zero validated outputs is still an error.
    assert!(f.coordinator.synthesize(&run_id, None, true).is_err());
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn synthesize_renders_and_stores_provenance() {
    let f = fixture();
    let cancel = CancellationToken::new();
    let run_id = f
        .coordinator
        .start("q", &quick_preset(120_000), &cancel)
        .await
        .unwrap();

    let driver = {
        let coordinator = Arc::clone(&f.coordinator);
        let run = run_id.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.drive(&run, &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    for (_, pane) in panes_of(&f, &run_id) {
        f.mux.script_capture(&pane, VALID_OUTPUT);
    }
    driver.await.unwrap().unwrap();

    let markdown = f
        .coordinator
        .synthesize_rendered(&run_id, None, OutputFormat::Markdown, false)
        .unwrap();
    assert!(markdown.contains("generation check"));

    let provenance = f.coordinator.provenance(&run_id).unwrap();
    assert_eq!(provenance.len(), 1);
    // The same finding came from both modes and merged.
    assert_eq!(provenance[0].sources.len(), 2);
    f.shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn unknown_preset_or_run_errors() {
    let f = fixture();
    assert!(preset::resolve("nope").is_err());
    assert!(f.coordinator.load_session("missing-run").is_err());
    assert!(f.coordinator.provenance("missing-run").is_err());
}
