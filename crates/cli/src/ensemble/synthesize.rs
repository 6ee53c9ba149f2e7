// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthesis: merge validated mode outputs into one result.

use serde::{Deserialize, Serialize};

use super::collect::ModeOutput;
use super::merge::{merge, MergedFinding, Provenance};
use super::preset::SynthesisStrategy;

/// Output rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "md" | "markdown" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Limits applied to the synthesized result.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisLimits {
    pub max_findings: usize,
    pub min_confidence: f64,
}

impl Default for SynthesisLimits {
    fn default() -> Self {
        Self { max_findings: 50, min_confidence: 0.2 }
    }
}

/// The unified answer produced from an ensemble run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub findings: Vec<MergedFinding>,
    /// Adversarial/critical findings called out separately.
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    /// Mean confidence over surviving findings.
    pub confidence: f64,
    /// Counts of what synthesis did: inputs, merged, filtered, kept.
    pub audit_report: AuditReport,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    pub modes_contributing: usize,
    pub input_findings: usize,
    pub merged_findings: usize,
    pub filtered_low_confidence: usize,
    pub truncated_over_max: usize,
    pub strategy: String,
}

/// Run synthesis over validated outputs.
pub fn synthesize(
    outputs: &[ModeOutput],
    strategy: SynthesisStrategy,
    limits: SynthesisLimits,
) -> SynthesisResult {
    let input_findings: usize = outputs.iter().map(|o| o.findings.len()).sum();
    let mut merged = merge(outputs);
    let merged_count = merged.len();

    // Strategy shaping.
    match strategy {
        SynthesisStrategy::Consensus => {
            // Corroborated findings first, strongest singletons after.
            merged.sort_by(|a, b| {
                b.sources
                    .len()
                    .cmp(&a.sources.len())
                    .then(b.confidence.total_cmp(&a.confidence))
            });
        }
        SynthesisStrategy::Weighted => {
            merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        }
        SynthesisStrategy::Union => {}
    }

    // Confidence floor.
    let before_filter = merged.len();
    merged.retain(|m| m.confidence >= limits.min_confidence);
    let filtered = before_filter - merged.len();
    for m in &mut merged {
        if filtered > 0 && !m.transformations.contains(&"filtered".to_owned()) {
            m.transformations.push("filtered".to_owned());
        }
    }

    // Size cap.
    let truncated = merged.len().saturating_sub(limits.max_findings);
    merged.truncate(limits.max_findings);

    let confidence = if merged.is_empty() {
        0.0
    } else {
        merged.iter().map(|m| m.confidence).sum::<f64>() / merged.len() as f64
    };

    let risks = merged
        .iter()
        .filter(|m| m.sources.iter().any(|s| s.contains("adversarial") || s.contains("critic")))
        .map(|m| m.finding.text.clone())
        .collect();
    let recommendations = merged
        .iter()
        .filter(|m| m.sources.len() > 1)
        .map(|m| format!("address: {}", m.finding.text))
        .collect();

    SynthesisResult {
        audit_report: AuditReport {
            modes_contributing: outputs.len(),
            input_findings,
            merged_findings: merged_count,
            filtered_low_confidence: filtered,
            truncated_over_max: truncated,
            strategy: strategy.as_str().to_owned(),
        },
        confidence,
        risks,
        recommendations,
        findings: merged,
    }
}

impl SynthesisResult {
    /// Provenance records for every surviving finding.
    pub fn provenance(&self) -> Vec<Provenance> {
        self.findings.iter().map(MergedFinding::provenance).collect()
    }

    /// Render in the requested format.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            OutputFormat::Markdown => Ok(self.render_markdown()),
        }
    }

    fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Ensemble synthesis\n\n");
        out.push_str(&format!(
            "confidence: {:.2} \u{b7} strategy: {} \u{b7} {} finding(s)\n\n",
            self.confidence,
            self.audit_report.strategy,
            self.findings.len()
        ));

        out.push_str("## Findings\n\n");
        for m in &self.findings {
            let location = match (&m.finding.file, m.finding.line_start) {
                (Some(file), Some(line)) => format!(" ({file}:{line})"),
                (Some(file), None) => format!(" ({file})"),
                _ => String::new(),
            };
            out.push_str(&format!(
                "- {}{location} \u{2014} {:.2} [{}]\n",
                m.finding.text,
                m.confidence,
                m.sources.join(", ")
            ));
        }

        if !self.risks.is_empty() {
            out.push_str("\n## Risks\n\n");
            for risk in &self.risks {
                out.push_str(&format!("- {risk}\n"));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for rec in &self.recommendations {
                out.push_str(&format!("- {rec}\n"));
            }
        }

        out.push_str(&format!(
            "\n## Audit\n\n{} mode(s), {} input finding(s), {} after merge, \
             {} filtered, {} truncated\n",
            self.audit_report.modes_contributing,
            self.audit_report.input_findings,
            self.audit_report.merged_findings,
            self.audit_report.filtered_low_confidence,
            self.audit_report.truncated_over_max,
        ));
        out
    }
}

#[cfg(test)]
#[path = "synthesize_tests.rs"]
mod tests;
