// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pane output streaming.
//!
//! Preferred mode asks the multiplexer to mirror the pane into a FIFO and
//! tails it, batching lines into ordered [`StreamEvent`]s. When pipe setup
//! reports `Unavailable`, the streamer degrades to polling `capture` and
//! emits whole-snapshot events with `is_full = true`. Per-pane events are
//! strictly FIFO with a monotonically increasing `seq`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{stream_dir, StreamConfig};
use crate::error::{NtmError, Result};
use crate::mux::{Mux, MuxError, PaneId};
use crate::redact::hash8;

/// One batch of pane output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub target: PaneId,
    pub lines: Vec<String>,
    /// Monotonic per-pane sequence number, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// True for fallback-mode whole-snapshot events.
    pub is_full: bool,
}

/// FIFO path for a pane: `/tmp/ntm_pane_streams/<hash>.fifo`.
pub fn fifo_path(pane: &PaneId) -> PathBuf {
    stream_dir().join(format!("{}.fifo", hash8(&pane.0)))
}

/// Tails one pane. Create per pane, `start` once, `stop` any number of
/// times.
pub struct PaneStreamer {
    mux: Arc<dyn Mux>,
    pane: PaneId,
    config: StreamConfig,
    running: bool,
    using_fallback: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl PaneStreamer {
    pub fn new(mux: Arc<dyn Mux>, pane: PaneId, config: StreamConfig) -> Self {
        Self {
            mux,
            pane,
            config,
            running: false,
            using_fallback: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn target(&self) -> &PaneId {
        &self.pane
    }

    /// Whether the streamer degraded to capture polling.
    pub fn using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Acquire)
    }

    /// Begin streaming into `tx`. Calling `start` while running is an error.
    pub async fn start(&mut self, tx: mpsc::Sender<StreamEvent>) -> Result<()> {
        if self.running {
            return Err(NtmError::Validation(format!(
                "stream for pane {} is already running",
                self.pane
            )));
        }
        self.shutdown = CancellationToken::new();

        match self.start_pipe(tx.clone()).await {
            Ok(()) => {
                self.using_fallback.store(false, Ordering::Release);
            }
            Err(MuxError::Unavailable(reason)) => {
                debug!(pane = %self.pane, reason, "pipe mode unavailable, polling instead");
                self.using_fallback.store(true, Ordering::Release);
                self.start_fallback(tx);
            }
            Err(e) => return Err(e.into()),
        }
        self.running = true;
        Ok(())
    }

    /// Stop streaming. Idempotent; safe on a never-started streamer.
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.shutdown.cancel();
        if !self.using_fallback() {
            if let Err(e) = self.mux.stop_pipe(&self.pane).await {
                warn!(pane = %self.pane, error = %e, "stop_pipe failed");
            }
            let _ = std::fs::remove_file(fifo_path(&self.pane));
        }
        self.running = false;
    }

    async fn start_pipe(&self, tx: mpsc::Sender<StreamEvent>) -> std::result::Result<(), MuxError> {
        let path = fifo_path(&self.pane);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MuxError::Unavailable(format!("stream dir: {e}")))?;
        }
        let _ = std::fs::remove_file(&path);
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR)
            .map_err(|e| MuxError::Unavailable(format!("mkfifo: {e}")))?;

        self.mux
            .pipe_to_fifo(&self.pane, &path.display().to_string())
            .await?;

        let pane = self.pane.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            pipe_loop(pane, path, config, tx, shutdown).await;
        });
        Ok(())
    }

    fn start_fallback(&self, tx: mpsc::Sender<StreamEvent>) {
        let mux = Arc::clone(&self.mux);
        let pane = self.pane.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            fallback_loop(mux, pane, config, tx, shutdown).await;
        });
    }
}

/// Tail the FIFO, batching lines by count or flush interval.
async fn pipe_loop(
    pane: PaneId,
    path: PathBuf,
    config: StreamConfig,
    tx: mpsc::Sender<StreamEvent>,
    shutdown: CancellationToken,
) {
    let seq = AtomicU64::new(0);

    let mut open_opts = tokio::fs::OpenOptions::new();
    open_opts.read(true);
    let file = tokio::select! {
        _ = shutdown.cancelled() => return,
        opened = open_opts.open(&path) => match opened {
            Ok(f) => f,
            Err(e) => {
                warn!(pane = %pane, error = %e, "fifo open failed");
                return;
            }
        },
    };
    let mut reader = BufReader::new(file).lines();
    let mut batch: Vec<String> = Vec::new();
    let mut flush = tokio::time::interval(config.flush_interval());
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = flush.tick() => {
                flush_batch(&pane, &mut batch, &seq, false, &tx).await;
            }
            line = reader.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        batch.push(line);
                        if batch.len() >= config.max_lines_per_event {
                            flush_batch(&pane, &mut batch, &seq, false, &tx).await;
                        }
                    }
                    // Writer closed: the pipe was stopped or the pane died.
                    Ok(None) => break,
                    Err(e) => {
                        warn!(pane = %pane, error = %e, "fifo read error");
                        break;
                    }
                }
            }
        }
    }
    flush_batch(&pane, &mut batch, &seq, false, &tx).await;
}

/// Poll `capture`, emitting a whole-snapshot event whenever it changes.
async fn fallback_loop(
    mux: Arc<dyn Mux>,
    pane: PaneId,
    config: StreamConfig,
    tx: mpsc::Sender<StreamEvent>,
    shutdown: CancellationToken,
) {
    let seq = AtomicU64::new(0);
    let mut poll = tokio::time::interval(config.fallback_poll_interval());
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_snapshot: Option<String> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = poll.tick() => {}
        }

        let snapshot = match mux.capture(&pane, config.fallback_poll_lines).await {
            Ok(s) => s,
            Err(MuxError::NotFound(_)) => break,
            Err(e) => {
                debug!(pane = %pane, error = %e, "fallback capture failed");
                continue;
            }
        };
        if last_snapshot.as_deref() == Some(snapshot.as_str()) {
            continue;
        }

        let lines: Vec<String> = snapshot.lines().map(str::to_owned).collect();
        last_snapshot = Some(snapshot);
        let event = StreamEvent {
            target: pane.clone(),
            lines,
            seq: seq.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            is_full: true,
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

async fn flush_batch(
    pane: &PaneId,
    batch: &mut Vec<String>,
    seq: &AtomicU64,
    is_full: bool,
    tx: &mpsc::Sender<StreamEvent>,
) {
    if batch.is_empty() {
        return;
    }
    let event = StreamEvent {
        target: pane.clone(),
        lines: std::mem::take(batch),
        seq: seq.fetch_add(1, Ordering::Relaxed) + 1,
        timestamp: Utc::now(),
        is_full,
    };
    let _ = tx.send(event).await;
}

/// Owns one streamer per pane and a shared outbound event channel.
pub struct StreamManager {
    mux: Arc<dyn Mux>,
    config: StreamConfig,
    streamers: tokio::sync::Mutex<HashMap<PaneId, PaneStreamer>>,
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamManager {
    /// Create a manager; the returned receiver carries events from every
    /// started stream.
    pub fn new(
        mux: Arc<dyn Mux>,
        config: StreamConfig,
        queue: usize,
    ) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        (
            Self {
                mux,
                config,
                streamers: tokio::sync::Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    /// Start streaming a pane. Idempotent: an already-streaming pane is a
    /// no-op success.
    pub async fn start_stream(&self, pane: &PaneId) -> Result<()> {
        let mut streamers = self.streamers.lock().await;
        if streamers.contains_key(pane) {
            return Ok(());
        }
        let mut streamer =
            PaneStreamer::new(Arc::clone(&self.mux), pane.clone(), self.config.clone());
        streamer.start(self.tx.clone()).await?;
        streamers.insert(pane.clone(), streamer);
        Ok(())
    }

    /// Stop streaming a pane. Unknown panes are a no-op.
    pub async fn stop_stream(&self, pane: &PaneId) {
        let mut streamers = self.streamers.lock().await;
        if let Some(mut streamer) = streamers.remove(pane) {
            streamer.stop().await;
        }
    }

    /// Whether the given pane is streaming via the capture-poll fallback.
    pub async fn using_fallback(&self, pane: &PaneId) -> Option<bool> {
        let streamers = self.streamers.lock().await;
        streamers.get(pane).map(|s| s.using_fallback())
    }

    /// Stop every stream. Always safe.
    pub async fn stop_all(&self) {
        let mut streamers = self.streamers.lock().await;
        for (_, mut streamer) in streamers.drain() {
            streamer.stop().await;
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
