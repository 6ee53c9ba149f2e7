// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finding merge with provenance.
//!
//! Findings from different modes dedup on the fingerprint
//! `(normalized text, file, line range)`. A merged finding keeps a
//! reference to every contributing mode and records how it was transformed
//! on the way into the final result.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::textutil::normalize_for_fingerprint;

use super::collect::{Finding, ModeOutput};

/// Stable content fingerprint for deduplication.
pub fn fingerprint(finding: &Finding) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_for_fingerprint(&finding.text).as_bytes());
    hasher.update(b"\x1f");
    hasher.update(finding.file.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\x1f");
    hasher.update(format!("{:?}-{:?}", finding.line_start, finding.line_end).as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// A deduplicated finding with its contributing modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedFinding {
    pub fingerprint: String,
    pub finding: Finding,
    /// Mode ids that produced this finding, in first-seen order.
    pub sources: Vec<String>,
    /// Transformations applied during synthesis (`merged`, `filtered`,
    /// `cited`).
    pub transformations: Vec<String>,
    /// Combined confidence after corroboration.
    pub confidence: f64,
}

/// Per-finding provenance record surfaced by `ensemble provenance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub fingerprint: String,
    pub text: String,
    pub sources: Vec<String>,
    pub transformations: Vec<String>,
    pub final_confidence: f64,
}

impl MergedFinding {
    pub fn provenance(&self) -> Provenance {
        Provenance {
            fingerprint: self.fingerprint.clone(),
            text: self.finding.text.clone(),
            sources: self.sources.clone(),
            transformations: self.transformations.clone(),
            final_confidence: self.confidence,
        }
    }
}

/// Merge mode outputs with deduplication.
///
/// Corroboration raises confidence: each additional source halves the
/// remaining distance to 1.0. Output order is deterministic: first
/// appearance across the input order.
pub fn merge(outputs: &[ModeOutput]) -> Vec<MergedFinding> {
    let mut order: Vec<String> = Vec::new();
    let mut by_print: std::collections::HashMap<String, MergedFinding> =
        std::collections::HashMap::new();

    for output in outputs {
        for finding in &output.findings {
            let print = fingerprint(finding);
            match by_print.get_mut(&print) {
                Some(merged) => {
                    if !merged.sources.contains(&output.mode_id) {
                        merged.sources.push(output.mode_id.clone());
                    }
                    if !merged.transformations.contains(&"merged".to_owned()) {
                        merged.transformations.push("merged".to_owned());
                    }
                    merged.confidence += (1.0 - merged.confidence) / 2.0;
                    // Keep the most confident phrasing.
                    if finding.confidence > merged.finding.confidence {
                        merged.finding = finding.clone();
                    }
                }
                None => {
                    order.push(print.clone());
                    by_print.insert(
                        print.clone(),
                        MergedFinding {
                            fingerprint: print,
                            finding: finding.clone(),
                            sources: vec![output.mode_id.clone()],
                            transformations: vec![],
                            confidence: finding.confidence,
                        },
                    );
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|print| by_print.remove(&print))
        .collect()
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
