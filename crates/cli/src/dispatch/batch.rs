// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch prompt files.
//!
//! Two layouts: prompts separated by `---`-only lines (multi-line prompts),
//! or one prompt per line when no separator is present. `# …` comment lines
//! are stripped; a `# priority: N` comment immediately preceding a prompt
//! assigns priority 0-4 (lower runs first). The sort is stable: equal
//! priorities keep file order, unset priorities sort last.

use serde::{Deserialize, Serialize};

use crate::error::{NtmError, Result};

/// One prompt from a batch file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPrompt {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

/// Parse a batch file's contents. An empty batch is an error.
pub fn parse(content: &str) -> Result<Vec<BatchPrompt>> {
    let has_separator = content.lines().any(|l| l.trim() == "---");
    let prompts = if has_separator {
        parse_blocks(content)?
    } else {
        parse_lines(content)?
    };
    if prompts.is_empty() {
        return Err(NtmError::Validation("batch file contains no prompts".into()));
    }
    Ok(prompts)
}

/// Stable sort by priority; unset priorities last.
pub fn sort_by_priority(prompts: &mut [BatchPrompt]) {
    prompts.sort_by_key(|p| p.priority.map_or(u16::from(u8::MAX) + 1, u16::from));
}

fn parse_priority_comment(line: &str) -> Result<Option<u8>> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('#') else {
        return Ok(None);
    };
    let rest = rest.trim();
    let Some(value) = rest.strip_prefix("priority:") else {
        return Ok(None);
    };
    let value = value.trim();
    let n: u8 = value.parse().map_err(|_| {
        NtmError::Validation(format!("invalid priority {value:?} in batch file"))
    })?;
    if n > 4 {
        return Err(NtmError::Validation(format!(
            "priority {n} out of range (0-4)"
        )));
    }
    Ok(Some(n))
}

fn parse_blocks(content: &str) -> Result<Vec<BatchPrompt>> {
    let mut prompts = Vec::new();
    let mut pending_priority: Option<u8> = None;
    let mut block: Vec<&str> = Vec::new();

    let mut flush =
        |block: &mut Vec<&str>, pending: &mut Option<u8>, prompts: &mut Vec<BatchPrompt>| {
            let text = block.join("\n").trim().to_owned();
            block.clear();
            if !text.is_empty() {
                prompts.push(BatchPrompt { text, priority: pending.take() });
            }
        };

    for line in content.lines() {
        if line.trim() == "---" {
            flush(&mut block, &mut pending_priority, &mut prompts);
            continue;
        }
        if let Some(priority) = parse_priority_comment(line)? {
            pending_priority = Some(priority);
            continue;
        }
        if line.trim_start().starts_with('#') {
            continue;
        }
        block.push(line);
    }
    flush(&mut block, &mut pending_priority, &mut prompts);
    Ok(prompts)
}

fn parse_lines(content: &str) -> Result<Vec<BatchPrompt>> {
    let mut prompts = Vec::new();
    let mut pending_priority: Option<u8> = None;

    for line in content.lines() {
        if let Some(priority) = parse_priority_comment(line)? {
            pending_priority = Some(priority);
            continue;
        }
        if line.trim_start().starts_with('#') {
            continue;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        prompts.push(BatchPrompt {
            text: text.to_owned(),
            priority: pending_priority.take(),
        });
    }
    Ok(prompts)
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
