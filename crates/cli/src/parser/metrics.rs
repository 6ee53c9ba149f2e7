// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric extraction from stripped agent output.
//!
//! Agents drift on exact phrasing, so each metric probes a few known
//! renderings and takes the last occurrence in the buffer — the most
//! recent value is the one that matters.

use std::sync::OnceLock;

use regex::Regex;

struct MetricPatterns {
    context: Vec<Regex>,
    tokens: Vec<Regex>,
    memory: Vec<Regex>,
}

fn metric_patterns() -> &'static MetricPatterns {
    static INSTANCE: OnceLock<MetricPatterns> = OnceLock::new();
    INSTANCE.get_or_init(|| MetricPatterns {
        context: compile(&[
            r"(\d+(?:\.\d+)?)%\s+context\s+left",
            r"(?i)context\s+(?:left|remaining)[:\s]+(\d+(?:\.\d+)?)%",
            r"(?i)auto-compact[:\s]+(\d+(?:\.\d+)?)%",
        ]),
        tokens: compile(&[
            r"Token usage:\s*total=([\d,]+)",
            r"(?i)tokens?\s+used[:\s]+([\d,]+)",
            r"(?i)([\d,]+)\s+tokens\s+used",
        ]),
        memory: compile(&[
            r"(?i)memory[:\s]+(\d+(?:\.\d+)?)\s*MB",
            r"(?i)mem\s+(\d+(?:\.\d+)?)\s*MB",
        ]),
    })
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

fn last_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<&'t str> {
    for re in patterns {
        if let Some(caps) = re.captures_iter(text).last() {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str());
            }
        }
    }
    None
}

/// Remaining context budget as a percentage in `[0, 100]`.
pub fn context_remaining(text: &str) -> Option<f64> {
    let raw: f64 = last_capture(&metric_patterns().context, text)?.parse().ok()?;
    Some(raw.clamp(0.0, 100.0))
}

/// Total tokens used, thousands separators tolerated.
pub fn tokens_used(text: &str) -> Option<u64> {
    let raw = last_capture(&metric_patterns().tokens, text)?;
    raw.replace(',', "").parse().ok()
}

/// Resident memory in megabytes.
pub fn memory_mb(text: &str) -> Option<f64> {
    last_capture(&metric_patterns().memory, text)?.parse().ok()
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
