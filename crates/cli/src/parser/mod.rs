// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output parser: derives a structured [`AgentState`] from noisy pane
//! scrollback.
//!
//! The pipeline order is contractual: strip escapes, detect the agent type
//! (banner first, pattern frequency as fallback), evaluate the state
//! classifier sets, extract metrics, score confidence, then capture the
//! trailing sample. Every parse builds a fresh value — nothing is mutated
//! incrementally — and repeated parses of the same bytes are identical,
//! including when several agent types tie on pattern score.

pub mod metrics;
pub mod patterns;
pub mod strip;

use serde::{Deserialize, Serialize};

use crate::agent::AgentType;
use crate::config::ParserConfig;
use crate::textutil::{last_lines, truncate_head, truncate_tail};

use patterns::patterns;
use strip::strip_ansi;

/// Context budget (percent) at or below which the agent is considered low.
const CONTEXT_LOW_THRESHOLD: f64 = 10.0;

/// Bytes of stripped output inspected for a startup banner.
const HEADER_REGION: usize = 400;

/// Suggested operator action derived from the parsed flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    ContextLowContinue,
    RateLimitedWait,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextLowContinue => "context-low-continue",
            Self::RateLimitedWait => "rate-limited-wait",
        }
    }
}

/// Structured state derived from one pane capture.
///
/// Value-typed: each parse produces a fresh instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub agent: AgentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub is_working: bool,
    pub is_idle: bool,
    pub is_rate_limited: bool,
    pub is_in_error: bool,
    pub is_context_low: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_remaining: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    pub work_indicators: Vec<String>,
    pub limit_indicators: Vec<String>,
    pub raw_sample: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// The output parser. Cheap to construct; pattern tables are process-wide.
#[derive(Debug, Clone)]
pub struct Parser {
    sample_length: usize,
    idle_window: usize,
}

impl Parser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            sample_length: config.sample_length,
            idle_window: config.idle_window_lines,
        }
    }

    /// Parse a raw pane capture, detecting the agent type from the output.
    pub fn parse(&self, raw: &[u8]) -> AgentState {
        self.parse_inner(raw, None)
    }

    /// Parse with a known agent type, skipping detection. Used when the
    /// lifecycle controller recorded which agent it spawned.
    pub fn parse_with_hint(&self, raw: &[u8], hint: AgentType) -> AgentState {
        self.parse_inner(raw, Some(hint))
    }

    fn parse_inner(&self, raw: &[u8], hint: Option<AgentType>) -> AgentState {
        let text = strip_ansi(raw);
        let set = patterns();

        // Type detection: hint > banner > pattern frequency.
        let (agent, banner_matched) = match hint {
            Some(t) => (t, false),
            None => detect_type(&text),
        };

        // Rate-limit classifiers: per-type first, then the default set.
        let mut limit_indicators: Vec<String> = Vec::new();
        if let Some(entry) = set.agents.iter().find(|a| a.agent == agent) {
            for re in &entry.rate_limit {
                if re.is_match(&text) {
                    limit_indicators.push(re.as_str().to_owned());
                }
            }
        }
        for re in &set.rate_limit_default {
            if re.is_match(&text) {
                limit_indicators.push(re.as_str().to_owned());
            }
        }
        let is_rate_limited = !limit_indicators.is_empty();

        // Work classifiers over the whole buffer.
        let work_indicators: Vec<String> = set
            .work
            .iter()
            .filter(|w| w.re.is_match(&text))
            .map(|w| w.name.to_owned())
            .collect();
        let is_working = !work_indicators.is_empty();

        // Idle classifiers see only the trailing window, so a shell prompt
        // buried in history does not read as present idleness.
        let tail = last_lines(&text, self.idle_window);
        let is_idle = tail
            .iter()
            .any(|line| set.idle.iter().any(|re| re.is_match(line)));

        let is_in_error = set.error.iter().any(|re| re.is_match(&text));

        // Metrics.
        let context_remaining = metrics::context_remaining(&text);
        let tokens_used = metrics::tokens_used(&text);
        let memory_mb = metrics::memory_mb(&text);
        let is_context_low =
            context_remaining.is_some_and(|pct| pct <= CONTEXT_LOW_THRESHOLD);

        let model = set
            .agents
            .iter()
            .find(|a| a.agent == agent)
            .and_then(|a| a.model.as_ref())
            .and_then(|re| re.captures(&text))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned());

        let confidence = score_confidence(ConfidenceInputs {
            known_type: agent != AgentType::Unknown,
            banner_matched,
            has_context: context_remaining.is_some(),
            has_tokens: tokens_used.is_some(),
            work_indicators: work_indicators.len(),
            rate_limited: is_rate_limited,
            conflicted: is_working && is_idle,
        });

        let recommendation = if is_rate_limited {
            Some(Recommendation::RateLimitedWait)
        } else if is_context_low {
            Some(Recommendation::ContextLowContinue)
        } else {
            None
        };

        AgentState {
            agent,
            model,
            is_working,
            is_idle,
            is_rate_limited,
            is_in_error,
            is_context_low,
            context_remaining,
            tokens_used,
            memory_mb,
            work_indicators,
            limit_indicators,
            raw_sample: truncate_tail(&text, self.sample_length).to_owned(),
            confidence,
            recommendation,
        }
    }
}

/// Detect the agent type. Returns the type and whether a banner matched.
fn detect_type(text: &str) -> (AgentType, bool) {
    let set = patterns();
    let header = truncate_head(text, HEADER_REGION);

    for entry in &set.agents {
        if entry.banner.as_ref().is_some_and(|re| re.is_match(header)) {
            return (entry.agent, true);
        }
    }

    // Frequency fallback. The table follows the fixed AgentType total order
    // and only a strictly greater score displaces the current winner, so
    // score ties resolve to the earlier type deterministically.
    let mut best = AgentType::Unknown;
    let mut best_score = 0usize;
    for entry in &set.agents {
        let score: usize =
            entry.signatures.iter().map(|re| re.find_iter(text).count()).sum();
        if score > best_score {
            best = entry.agent;
            best_score = score;
        }
    }
    (best, false)
}

struct ConfidenceInputs {
    known_type: bool,
    banner_matched: bool,
    has_context: bool,
    has_tokens: bool,
    work_indicators: usize,
    rate_limited: bool,
    conflicted: bool,
}

/// Confidence formula: start at 0.5, add 0.1 per corroborating signal
/// (known type, each metric, up to three work indicators, a rate-limit
/// indicator), subtract 0.3 for an unknown type. A banner match floors the
/// result at 0.8. The working/idle conflict penalty is applied last and
/// caps conflicted parses at 0.3 unconditionally.
fn score_confidence(inputs: ConfidenceInputs) -> f64 {
    let mut confidence: f64 = 0.5;
    if inputs.known_type {
        confidence += 0.1;
    } else {
        confidence -= 0.3;
    }
    if inputs.has_context {
        confidence += 0.1;
    }
    if inputs.has_tokens {
        confidence += 0.1;
    }
    confidence += 0.1 * inputs.work_indicators.min(3) as f64;
    if inputs.rate_limited {
        confidence += 0.1;
    }
    if inputs.banner_matched {
        confidence = confidence.max(0.8);
    }
    if inputs.conflicted {
        confidence = (confidence - 0.2).min(0.3);
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
