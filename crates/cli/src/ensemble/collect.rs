// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mode output collection and validation.
//!
//! A mode's pane output validates when it yields a non-empty structured
//! findings list. The primary format is a JSON object with a `findings`
//! array (agents are prompted for it); a markdown bullet list is accepted
//! as a fallback since agents drift on format.

use serde::{Deserialize, Serialize};

use crate::error::{NtmError, Result};

/// One structured finding from a mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// A validated mode output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeOutput {
    pub mode_id: String,
    pub findings: Vec<Finding>,
}

/// Validate raw pane output into a findings list.
///
/// Tries, in order: a bare JSON object, the last JSON object embedded in
/// the text (agents echo prose around it), then markdown bullets. Empty
/// findings fail validation.
pub fn validate(mode_id: &str, raw: &str) -> Result<ModeOutput> {
    let findings = parse_json_findings(raw)
        .or_else(|| parse_markdown_findings(raw))
        .unwrap_or_default();

    if findings.is_empty() {
        return Err(NtmError::Validation(format!(
            "mode {mode_id}: output has no structured findings"
        )));
    }
    Ok(ModeOutput {
        mode_id: mode_id.to_owned(),
        findings,
    })
}

#[derive(Deserialize)]
struct FindingsEnvelope {
    findings: Vec<Finding>,
}

fn parse_json_findings(raw: &str) -> Option<Vec<Finding>> {
    if let Ok(envelope) = serde_json::from_str::<FindingsEnvelope>(raw.trim()) {
        return Some(envelope.findings);
    }
    // Scan for embedded JSON objects, last one wins (agents often print a
    // preamble, then the answer).
    let mut best: Option<Vec<Finding>> = None;
    for (start, _) in raw.match_indices('{') {
        let candidate = balanced_object(&raw[start..])?;
        if let Ok(envelope) = serde_json::from_str::<FindingsEnvelope>(candidate) {
            best = Some(envelope.findings);
        }
    }
    best
}

/// The balanced `{...}` prefix of `s`, if any. Tracks strings so braces in
/// finding text do not derail the scan.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_markdown_findings(raw: &str) -> Option<Vec<Finding>> {
    let findings: Vec<Finding> = raw
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let text = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))?;
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Finding {
                text: text.to_owned(),
                file: None,
                line_start: None,
                line_end: None,
                confidence: default_confidence(),
            })
        })
        .collect();
    if findings.is_empty() {
        None
    } else {
        Some(findings)
    }
}

#[cfg(test)]
#[path = "collect_tests.rs"]
mod tests;
