// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preflight lint: structural checks on a prompt before it reaches any
//! pane. Findings never quote matched secret bytes.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::redact::redactor;

/// Prompt size that blocks outright.
pub const MAX_PROMPT_BYTES: usize = 100_000;
/// Prompt size that draws a warning.
pub const WARN_PROMPT_BYTES: usize = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One lint finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

/// Result of a preflight run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreflightReport {
    pub findings: Vec<Finding>,
    pub strict: bool,
}

impl PreflightReport {
    pub fn errors(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Error).count()
    }

    pub fn warnings(&self) -> usize {
        self.findings.iter().filter(|f| f.severity == Severity::Warning).count()
    }

    /// Number of findings that block the send. In strict mode warnings
    /// count as errors.
    pub fn blocking(&self) -> usize {
        if self.strict {
            self.errors() + self.warnings()
        } else {
            self.errors()
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocking() > 0
    }
}

struct DestructiveRule {
    name: &'static str,
    re: Regex,
}

fn destructive_rules() -> &'static Vec<DestructiveRule> {
    static RULES: OnceLock<Vec<DestructiveRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let table: &[(&'static str, &str)] = &[
            ("rm-rf-root", r"rm\s+-[a-zA-Z]*r[a-zA-Z]*f[a-zA-Z]*\s+(?:/|~)(?:\s|$)"),
            ("force-push", r"git\s+push\s+(?:\S+\s+)*(?:--force\b|-f\b)"),
            ("drop-table", r"(?i)\bDROP\s+(?:TABLE|DATABASE)\b"),
            ("mkfs", r"\bmkfs(?:\.\w+)?\s"),
            ("dd-device", r"\bdd\s+[^|\n]*of=/dev/"),
            ("fork-bomb", r":\(\)\s*\{\s*:\|:&\s*\}\s*;"),
        ];
        table
            .iter()
            .filter_map(|(name, pat)| {
                Regex::new(pat).ok().map(|re| DestructiveRule { name, re })
            })
            .collect()
    })
}

struct PiiRule {
    name: &'static str,
    severity: Severity,
    re: Regex,
}

fn pii_rules() -> &'static Vec<PiiRule> {
    static RULES: OnceLock<Vec<PiiRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let table: &[(&'static str, Severity, &str)] = &[
            ("email", Severity::Info, r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b"),
            ("ssn", Severity::Warning, r"\b\d{3}-\d{2}-\d{4}\b"),
            ("card-number", Severity::Warning, r"\b(?:\d[ -]?){15}\d\b"),
        ];
        table
            .iter()
            .filter_map(|(name, severity, pat)| {
                Regex::new(pat).ok().map(|re| PiiRule { name, severity: *severity, re })
            })
            .collect()
    })
}

/// Run every lint rule over the prompt.
pub fn run(prompt: &str, strict: bool) -> PreflightReport {
    let mut findings = Vec::new();

    if prompt.trim().is_empty() {
        findings.push(Finding {
            rule: "empty".to_owned(),
            severity: Severity::Error,
            message: "prompt is empty".to_owned(),
        });
    }

    if prompt.len() > MAX_PROMPT_BYTES {
        findings.push(Finding {
            rule: "oversize".to_owned(),
            severity: Severity::Error,
            message: format!(
                "prompt is {} bytes (limit {MAX_PROMPT_BYTES})",
                prompt.len()
            ),
        });
    } else if prompt.len() > WARN_PROMPT_BYTES {
        findings.push(Finding {
            rule: "oversize".to_owned(),
            severity: Severity::Warning,
            message: format!(
                "prompt is {} bytes (warning threshold {WARN_PROMPT_BYTES})",
                prompt.len()
            ),
        });
    }

    // Secrets: category counts only.
    let secrets = redactor().scan(prompt);
    if !secrets.is_empty() {
        let mut by_category: std::collections::BTreeMap<&'static str, usize> =
            std::collections::BTreeMap::new();
        for f in &secrets {
            *by_category.entry(f.category.as_str()).or_default() += 1;
        }
        for (category, count) in by_category {
            findings.push(Finding {
                rule: "secret".to_owned(),
                severity: Severity::Warning,
                message: format!("{category}={count}"),
            });
        }
    }

    for rule in destructive_rules() {
        if rule.re.is_match(prompt) {
            findings.push(Finding {
                rule: format!("destructive:{}", rule.name),
                severity: Severity::Warning,
                message: format!("destructive command pattern ({})", rule.name),
            });
        }
    }

    for rule in pii_rules() {
        let count = rule.re.find_iter(prompt).count();
        if count > 0 {
            findings.push(Finding {
                rule: format!("pii:{}", rule.name),
                severity: rule.severity,
                message: format!("{} possible {} value(s)", count, rule.name),
            });
        }
    }

    PreflightReport { findings, strict }
}

#[cfg(test)]
#[path = "preflight_tests.rs"]
mod tests;
