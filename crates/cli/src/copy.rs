// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pane capture for the clipboard: filter scrollback, optionally keep only
//! fenced code blocks, pipe to the platform clipboard tool.

use std::process::Stdio;

use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::error::{NtmError, Result};

/// Extract the contents of fenced code blocks, joined by blank lines.
/// Fence language tags are dropped; unterminated fences run to the end.
pub fn extract_code_blocks(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(block) => blocks.push(block.join("\n")),
                None => current = Some(Vec::new()),
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }
    if let Some(block) = current {
        blocks.push(block.join("\n"));
    }
    blocks.join("\n\n")
}

/// Keep only lines matching the pattern.
pub fn filter_lines(text: &str, pattern: &str) -> Result<String> {
    let re = Regex::new(pattern)
        .map_err(|e| NtmError::Validation(format!("invalid pattern {pattern:?}: {e}")))?;
    Ok(text
        .lines()
        .filter(|line| re.is_match(line))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// The platform clipboard command, first one present on PATH.
pub fn clipboard_command() -> Option<(&'static str, &'static [&'static str])> {
    const CANDIDATES: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];
    CANDIDATES
        .iter()
        .find(|(binary, _)| which(binary))
        .copied()
}

fn which(binary: &str) -> bool {
    let Ok(path) = std::env::var("PATH") else {
        return false;
    };
    path.split(':').any(|dir| std::path::Path::new(dir).join(binary).is_file())
}

/// Pipe text into the platform clipboard tool.
pub async fn copy_to_clipboard(text: &str) -> Result<()> {
    let Some((binary, args)) = clipboard_command() else {
        return Err(NtmError::Unavailable(
            "no clipboard tool found (pbcopy, wl-copy, xclip, xsel)".into(),
        ));
    };
    let mut child = tokio::process::Command::new(binary)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| NtmError::Unavailable(format!("{binary}: {e}")))?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| NtmError::Transient(format!("{binary} stdin: {e}")))?;
    }
    let status = child
        .wait()
        .await
        .map_err(|e| NtmError::Transient(format!("{binary}: {e}")))?;
    if !status.success() {
        return Err(NtmError::Transient(format!("{binary} exited with {status}")));
    }
    Ok(())
}

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;
