// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime assembly: wires the bus, scheduler, streamers, lifecycle,
//! dispatcher, and ensemble coordinator around one multiplexer.
//!
//! The process-wide singletons (bus, scheduler, redaction config) live
//! here as explicit fields — the only hidden singleton is the CLI entry
//! point that builds one of these.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;
use crate::config::{state_dir, Config};
use crate::dispatch::reservation::ReservationTable;
use crate::dispatch::Dispatcher;
use crate::ensemble::checkpoint::CheckpointStore;
use crate::ensemble::EnsembleCoordinator;
use crate::history::HistoryStore;
use crate::lifecycle::LifecycleController;
use crate::mux::{Mux, TmuxMux};
use crate::parser::Parser;
use crate::scheduler::headroom::{ProcProbe, ResourceProbe};
use crate::scheduler::SpawnScheduler;
use crate::stream::StreamManager;

pub struct Runtime {
    pub config: Arc<Config>,
    pub mux: Arc<dyn Mux>,
    pub bus: Arc<EventBus>,
    pub scheduler: Arc<SpawnScheduler>,
    pub streams: Arc<StreamManager>,
    pub lifecycle: Arc<LifecycleController>,
    pub reservations: Arc<ReservationTable>,
    pub dispatcher: Arc<Dispatcher>,
    pub ensemble: Arc<EnsembleCoordinator>,
    pub shutdown: CancellationToken,
}

impl Runtime {
    /// Assemble a runtime over the given multiplexer and resource probe.
    pub fn new(config: Config, mux: Arc<dyn Mux>, probe: Box<dyn ResourceProbe>) -> Self {
        let config = Arc::new(config);
        let bus = EventBus::new(config.bus_history_capacity());
        let scheduler =
            SpawnScheduler::new(config.scheduler.clone(), Arc::clone(&bus), probe);
        let (streams, stream_rx) =
            StreamManager::new(Arc::clone(&mux), config.stream.clone(), 256);
        let streams = Arc::new(streams);
        let lifecycle = Arc::new(LifecycleController::new(
            Arc::clone(&mux),
            Arc::clone(&scheduler),
            Arc::clone(&streams),
            Arc::clone(&bus),
            Arc::clone(&config),
        ));

        let shutdown = CancellationToken::new();
        lifecycle.attach_detection(
            stream_rx,
            Parser::new(&config.parser),
            shutdown.clone(),
        );

        let history = Arc::new(HistoryStore::new(state_dir().join("history"), &config));
        let reservations = Arc::new(ReservationTable::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&mux),
            Arc::clone(&lifecycle),
            Arc::clone(&reservations),
            history,
            Arc::clone(&bus),
            Arc::clone(&config),
        ));

        let store =
            CheckpointStore::new(state_dir().join("ensembles"), config.redaction.mode);
        let ensemble = Arc::new(EnsembleCoordinator::new(
            Arc::clone(&mux),
            Arc::clone(&lifecycle),
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
            store,
            Arc::clone(&config),
        ));

        Self {
            config,
            mux,
            bus,
            scheduler,
            streams,
            lifecycle,
            reservations,
            dispatcher,
            ensemble,
            shutdown,
        }
    }

    /// Runtime over the local tmux server.
    pub fn with_tmux(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(TmuxMux::new()),
            Box::new(ProcProbe::new("/")),
        )
    }

    /// Stop streams and background tasks. Safe to call more than once.
    pub async fn stop(&self) {
        self.streams.stop_all().await;
        self.shutdown.cancel();
    }
}
