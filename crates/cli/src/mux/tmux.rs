// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmux implementation of the multiplexer facade.

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::{Mux, MuxError, PaneId, PaneInfo, SessionInfo};

/// Facade over a local tmux server.
///
/// tmux tolerates concurrent clients poorly when commands race on the same
/// target, so all invocations are serialized through one async mutex.
pub struct TmuxMux {
    gate: Mutex<()>,
}

impl Default for TmuxMux {
    fn default() -> Self {
        Self::new()
    }
}

impl TmuxMux {
    pub fn new() -> Self {
        Self { gate: Mutex::new(()) }
    }

    async fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        let _guard = self.gate.lock().await;
        let output = Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| MuxError::Unavailable(format!("tmux not runnable: {e}")))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        Err(classify_tmux_error(&stderr))
    }
}

/// Map tmux stderr text onto the classified error taxonomy.
fn classify_tmux_error(stderr: &str) -> MuxError {
    let lower = stderr.to_lowercase();
    if lower.contains("no server running") || lower.contains("command not found") {
        return MuxError::Unavailable(stderr.to_owned());
    }
    if lower.contains("can't find") || lower.contains("session not found") {
        return MuxError::NotFound(stderr.to_owned());
    }
    if lower.contains("permission denied") || lower.contains("not allowed") {
        return MuxError::Denied(stderr.to_owned());
    }
    MuxError::Transient(stderr.to_owned())
}

#[async_trait]
impl Mux for TmuxMux {
    async fn create_session(&self, name: &str, dir: &str) -> Result<(), MuxError> {
        self.run(&["new-session", "-d", "-s", name, "-c", dir]).await?;
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        self.run(&["kill-session", "-t", name]).await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>, MuxError> {
        let out = match self
            .run(&["list-sessions", "-F", "#{session_name}\t#{session_windows}"])
            .await
        {
            Ok(out) => out,
            // No server simply means no sessions.
            Err(MuxError::Unavailable(_)) => return Ok(vec![]),
            Err(e) => return Err(e),
        };
        Ok(out
            .lines()
            .filter_map(|line| {
                let (name, panes) = line.split_once('\t')?;
                Some(SessionInfo {
                    name: name.to_owned(),
                    pane_count: panes.trim().parse().unwrap_or(0),
                })
            })
            .collect())
    }

    async fn list_panes(&self, session: &str) -> Result<Vec<PaneInfo>, MuxError> {
        let out = self
            .run(&[
                "list-panes",
                "-s",
                "-t",
                session,
                "-F",
                "#{pane_id}\t#{pane_index}\t#{pane_title}\t#{pane_current_command}",
            ])
            .await?;
        Ok(out.lines().filter_map(parse_pane_line).collect())
    }

    async fn split_pane(
        &self,
        session: &str,
        dir: &str,
        command: &str,
    ) -> Result<PaneInfo, MuxError> {
        let out = self
            .run(&[
                "split-window",
                "-t",
                session,
                "-c",
                dir,
                "-P",
                "-F",
                "#{pane_id}\t#{pane_index}\t#{pane_title}\t#{pane_current_command}",
                command,
            ])
            .await?;
        out.lines()
            .next()
            .and_then(parse_pane_line)
            .ok_or_else(|| MuxError::Transient("split-window produced no pane".to_owned()))
    }

    async fn send_keys(
        &self,
        pane: &PaneId,
        text: &str,
        press_enter: bool,
    ) -> Result<(), MuxError> {
        // -l = literal (no key-name interpretation), -- guards leading dashes.
        self.run(&["send-keys", "-t", &pane.0, "-l", "--", text]).await?;
        if press_enter {
            self.run(&["send-keys", "-t", &pane.0, "Enter"]).await?;
        }
        Ok(())
    }

    async fn send_interrupt(&self, pane: &PaneId) -> Result<(), MuxError> {
        self.run(&["send-keys", "-t", &pane.0, "C-c"]).await?;
        Ok(())
    }

    async fn capture(&self, pane: &PaneId, lines: usize) -> Result<String, MuxError> {
        let start = format!("-{lines}");
        self.run(&["capture-pane", "-t", &pane.0, "-p", "-S", &start]).await
    }

    async fn pipe_to_fifo(&self, pane: &PaneId, path: &str) -> Result<(), MuxError> {
        let sink = format!("cat >> \"{}\"", super::shell_escape(path));
        self.run(&["pipe-pane", "-t", &pane.0, "-o", &sink]).await?;
        Ok(())
    }

    async fn stop_pipe(&self, pane: &PaneId) -> Result<(), MuxError> {
        // pipe-pane with no command closes the existing pipe.
        self.run(&["pipe-pane", "-t", &pane.0]).await?;
        Ok(())
    }

    async fn set_pane_title(&self, pane: &PaneId, title: &str) -> Result<(), MuxError> {
        self.run(&["select-pane", "-t", &pane.0, "-T", title]).await?;
        Ok(())
    }

    async fn kill_pane(&self, pane: &PaneId) -> Result<(), MuxError> {
        self.run(&["kill-pane", "-t", &pane.0]).await?;
        Ok(())
    }
}

fn parse_pane_line(line: &str) -> Option<PaneInfo> {
    let mut parts = line.splitn(4, '\t');
    let id = parts.next()?;
    let index = parts.next()?.trim().parse().ok()?;
    let title = parts.next().unwrap_or_default();
    let command = parts.next().unwrap_or_default();
    Some(PaneInfo {
        id: PaneId(id.to_owned()),
        index,
        title: title.to_owned(),
        command: command.to_owned(),
    })
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
