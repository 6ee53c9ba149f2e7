// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret detection and redaction.
//!
//! One engine serves two boundaries: the send path (mode-dependent) and the
//! persistence path, where warn/redact/block all collapse to redact so no
//! secret ever reaches disk verbatim. Reads are never redacted.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Redaction policy applied on the send path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    /// No scanning at all.
    Off,
    /// Scan and report category counts; send the original text.
    #[default]
    Warn,
    /// Scan and substitute placeholders before sending.
    Redact,
    /// Scan and refuse to send anything when findings exist.
    Block,
}

impl RedactionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Redact => "redact",
            Self::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Self::Off),
            "warn" => Some(Self::Warn),
            "redact" => Some(Self::Redact),
            "block" => Some(Self::Block),
            _ => None,
        }
    }

    /// The effective mode on the persistence path: everything except `Off`
    /// collapses to `Redact`.
    pub fn for_write_path(&self) -> Self {
        match self {
            Self::Off => Self::Off,
            _ => Self::Redact,
        }
    }
}

impl std::fmt::Display for RedactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a detected secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SecretCategory {
    Password,
    ApiKey,
    AwsAccessKey,
    PrivateKey,
    BearerToken,
    ConnectionString,
}

impl SecretCategory {
    /// Uppercase tag used in placeholders and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "PASSWORD",
            Self::ApiKey => "API_KEY",
            Self::AwsAccessKey => "AWS_ACCESS_KEY",
            Self::PrivateKey => "PRIVATE_KEY",
            Self::BearerToken => "BEARER_TOKEN",
            Self::ConnectionString => "CONNECTION_STRING",
        }
    }
}

impl std::fmt::Display for SecretCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected secret: category plus byte span in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFinding {
    pub category: SecretCategory,
    pub start: usize,
    pub end: usize,
}

/// Outcome of scanning (and possibly rewriting) a text.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// The text to use downstream: original or placeholder-substituted.
    pub text: String,
    pub findings: Vec<SecretFinding>,
}

impl ScanResult {
    /// Category counts, sorted by category tag. Never exposes matched bytes.
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for f in &self.findings {
            *counts.entry(f.category.as_str()).or_default() += 1;
        }
        counts.into_iter().map(|(k, v)| (k.to_owned(), v)).collect()
    }
}

/// Compiled detection rules. Build once via [`redactor`].
pub struct Redactor {
    rules: Vec<(SecretCategory, Regex)>,
}

/// Process-wide redactor with the built-in rule set.
pub fn redactor() -> &'static Redactor {
    static INSTANCE: OnceLock<Redactor> = OnceLock::new();
    INSTANCE.get_or_init(Redactor::new)
}

impl Redactor {
    fn new() -> Self {
        // Patterns favor precision over recall: each one anchors on a
        // key-ish prefix or a well-known token shape, not on entropy.
        let table: &[(SecretCategory, &str)] = &[
            (
                SecretCategory::Password,
                r#"(?i)\b(?:password|passwd|pwd)\s*[=:]\s*\S+"#,
            ),
            (
                SecretCategory::ApiKey,
                r#"(?i)\b(?:api[_-]?key|secret[_-]?key|client[_-]?secret)\s*[=:]\s*\S+"#,
            ),
            (SecretCategory::ApiKey, r"\bsk-[A-Za-z0-9_-]{16,}\b"),
            (SecretCategory::AwsAccessKey, r"\bAKIA[0-9A-Z]{16}\b"),
            (
                SecretCategory::PrivateKey,
                r"-----BEGIN (?:RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----",
            ),
            (
                SecretCategory::BearerToken,
                r"(?i)\bbearer\s+[A-Za-z0-9._~+/-]{16,}=*",
            ),
            (SecretCategory::BearerToken, r"\bgh[pousr]_[A-Za-z0-9]{30,}\b"),
            (
                SecretCategory::ConnectionString,
                r"(?i)\b[a-z][a-z0-9+]*://[^/\s:@]+:[^@\s]+@\S+",
            ),
        ];
        let rules = table
            .iter()
            .filter_map(|(cat, pat)| Regex::new(pat).ok().map(|re| (*cat, re)))
            .collect();
        Self { rules }
    }

    /// Scan without rewriting. Findings are sorted by span start; overlapping
    /// matches keep the earliest (then longest) one.
    pub fn scan(&self, text: &str) -> Vec<SecretFinding> {
        let mut found: Vec<SecretFinding> = Vec::new();
        for (category, re) in &self.rules {
            for m in re.find_iter(text) {
                found.push(SecretFinding {
                    category: *category,
                    start: m.start(),
                    end: m.end(),
                });
            }
        }
        found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut kept: Vec<SecretFinding> = Vec::with_capacity(found.len());
        for f in found {
            if kept.last().is_none_or(|prev| f.start >= prev.end) {
                kept.push(f);
            }
        }
        kept
    }

    /// Apply the given mode. In `Redact` the returned text carries
    /// `[REDACTED:<CATEGORY>:<hash8>]` placeholders; in every other mode the
    /// original text is returned alongside the findings (empty for `Off`).
    pub fn apply(&self, text: &str, mode: RedactionMode) -> ScanResult {
        if mode == RedactionMode::Off {
            return ScanResult { text: text.to_owned(), findings: vec![] };
        }
        let findings = self.scan(text);
        if mode != RedactionMode::Redact || findings.is_empty() {
            return ScanResult { text: text.to_owned(), findings };
        }
        // Substitute from the back so earlier spans stay valid.
        let mut out = text.to_owned();
        for f in findings.iter().rev() {
            let placeholder = format!(
                "[REDACTED:{}:{}]",
                f.category.as_str(),
                hash8(&text[f.start..f.end])
            );
            out.replace_range(f.start..f.end, &placeholder);
        }
        ScanResult { text: out, findings }
    }
}

/// First 8 hex characters of the SHA-256 of `data`. Equal secrets redact to
/// equal placeholders without leaking length or content.
pub fn hash8(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut out = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
