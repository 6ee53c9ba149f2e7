// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ensemble presets: named bundles of reasoning modes, budgets, and a
//! synthesis strategy.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::agent::AgentType;
use crate::error::{NtmError, Result};

/// One reasoning mode in an ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mode {
    /// Unique stable identifier (`deductive`, `adversarial`, ...).
    pub id: String,
    /// Short display code shown in status tables (`DED`, `ADV`).
    pub code: String,
    /// Preferred agent type for this mode's pane.
    pub agent: AgentType,
    /// Prompt template; `{question}` is substituted at injection time.
    pub prompt_template: String,
}

impl Mode {
    /// Render the injection prompt for a question.
    pub fn render_prompt(&self, question: &str) -> String {
        self.prompt_template.replace("{question}", question)
    }
}

/// Token and time budget for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    pub per_mode_tokens: u64,
    pub total_tokens: u64,
    pub mode_timeout_ms: u64,
    pub retries: u32,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            per_mode_tokens: 100_000,
            total_tokens: 600_000,
            mode_timeout_ms: 15 * 60 * 1000,
            retries: 1,
        }
    }
}

impl Budget {
    pub fn mode_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.mode_timeout_ms)
    }
}

/// How mode outputs are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    /// Keep findings corroborated by two or more modes, then the strongest
    /// singletons.
    #[default]
    Consensus,
    /// Keep every deduplicated finding.
    Union,
    /// Weight by per-mode confidence only.
    Weighted,
}

impl SynthesisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consensus => "consensus",
            Self::Union => "union",
            Self::Weighted => "weighted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "consensus" => Some(Self::Consensus),
            "union" => Some(Self::Union),
            "weighted" => Some(Self::Weighted),
            _ => None,
        }
    }
}

/// A named ensemble preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub modes: Vec<Mode>,
    #[serde(default)]
    pub budget: Budget,
    #[serde(default)]
    pub strategy: SynthesisStrategy,
}

impl Preset {
    /// Validate mode uniqueness (ids and codes).
    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(NtmError::Validation(format!(
                "preset {} has no modes",
                self.name
            )));
        }
        let mut seen = std::collections::BTreeSet::new();
        for mode in &self.modes {
            if !seen.insert(&mode.id) {
                return Err(NtmError::Validation(format!(
                    "duplicate mode id {:?} in preset {}",
                    mode.id, self.name
                )));
            }
        }
        let mut codes = std::collections::BTreeSet::new();
        for mode in &self.modes {
            if !codes.insert(&mode.code) {
                return Err(NtmError::Validation(format!(
                    "duplicate mode code {:?} in preset {}",
                    mode.code, self.name
                )));
            }
        }
        Ok(())
    }

    /// Find a mode by id or display code.
    pub fn mode(&self, reference: &str) -> Option<&Mode> {
        self.modes
            .iter()
            .find(|m| m.id == reference || m.code.eq_ignore_ascii_case(reference))
    }
}

fn analysis_template(lens: &str) -> String {
    format!(
        "Analyze the following question through a {lens} lens.\n\
         Question: {{question}}\n\n\
         Respond with a JSON object: {{\"findings\": [{{\"text\": ..., \
         \"file\": ..., \"line_start\": ..., \"line_end\": ..., \
         \"confidence\": 0.0-1.0}}]}}. Findings must be concrete and cite \
         locations where applicable."
    )
}

/// Built-in presets, keyed by name. Insertion order is display order.
pub fn builtin_presets() -> IndexMap<String, Preset> {
    let mut presets = IndexMap::new();

    presets.insert(
        "council".to_owned(),
        Preset {
            name: "council".to_owned(),
            modes: vec![
                Mode {
                    id: "deductive".to_owned(),
                    code: "DED".to_owned(),
                    agent: AgentType::Claude,
                    prompt_template: analysis_template("deductive, first-principles"),
                },
                Mode {
                    id: "adversarial".to_owned(),
                    code: "ADV".to_owned(),
                    agent: AgentType::Codex,
                    prompt_template: analysis_template("adversarial, failure-seeking"),
                },
                Mode {
                    id: "empirical".to_owned(),
                    code: "EMP".to_owned(),
                    agent: AgentType::Gemini,
                    prompt_template: analysis_template("empirical, evidence-driven"),
                },
            ],
            budget: Budget::default(),
            strategy: SynthesisStrategy::Consensus,
        },
    );

    presets.insert(
        "pair".to_owned(),
        Preset {
            name: "pair".to_owned(),
            modes: vec![
                Mode {
                    id: "builder".to_owned(),
                    code: "BLD".to_owned(),
                    agent: AgentType::Claude,
                    prompt_template: analysis_template("constructive, solution-oriented"),
                },
                Mode {
                    id: "critic".to_owned(),
                    code: "CRT".to_owned(),
                    agent: AgentType::Codex,
                    prompt_template: analysis_template("critical, risk-focused"),
                },
            ],
            budget: Budget::default(),
            strategy: SynthesisStrategy::Union,
        },
    );

    presets
}

/// Resolve a preset by name from the built-ins.
pub fn resolve(name: &str) -> Result<Preset> {
    builtin_presets()
        .get(name)
        .cloned()
        .ok_or_else(|| NtmError::NotFound(format!("preset {name:?} not found")))
}

#[cfg(test)]
#[path = "preset_tests.rs"]
mod tests;
