// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern tables for agent classification and state flags.
//!
//! Tables are fixed arrays compiled once — never hash maps — so every scan
//! visits patterns in the same order on every run and every host.

use std::sync::OnceLock;

use regex::Regex;

use crate::agent::AgentType;

/// Compiled per-agent signature patterns.
pub struct AgentPatterns {
    pub agent: AgentType,
    /// Matches the agent's startup banner near the top of the buffer.
    pub banner: Option<Regex>,
    /// Frequency-scored signature patterns.
    pub signatures: Vec<Regex>,
    /// Agent-specific rate-limit phrases (checked before the default set).
    pub rate_limit: Vec<Regex>,
    /// Model-variant extraction from the banner region, capture group 1.
    pub model: Option<Regex>,
}

/// Named work-indicator pattern.
pub struct WorkPattern {
    pub name: &'static str,
    pub re: Regex,
}

/// The full compiled pattern set.
pub struct PatternSet {
    pub agents: Vec<AgentPatterns>,
    pub work: Vec<WorkPattern>,
    pub idle: Vec<Regex>,
    pub error: Vec<Regex>,
    pub rate_limit_default: Vec<Regex>,
}

/// Process-wide compiled patterns.
pub fn patterns() -> &'static PatternSet {
    static INSTANCE: OnceLock<PatternSet> = OnceLock::new();
    INSTANCE.get_or_init(build)
}

fn re(pattern: &str) -> Option<Regex> {
    Regex::new(pattern).ok()
}

fn re_vec(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| re(p)).collect()
}

fn build() -> PatternSet {
    let agents = vec![
        AgentPatterns {
            agent: AgentType::Claude,
            banner: re(r"Claude Code v\d"),
            signatures: re_vec(&[
                r"Claude Code",
                r"(?m)^\s*\u{276f}",
                r"esc to interrupt",
                r"\u{273b}",
                r"claude\.ai",
            ]),
            rate_limit: re_vec(&[
                r"(?i)usage limit reached",
                r"(?i)approaching usage limit",
                r"(?i)claude usage limit",
            ]),
            model: re(r"(?i)model:\s*(claude[\w.-]+)"),
        },
        AgentPatterns {
            agent: AgentType::Codex,
            banner: re(r"(?i)OpenAI Codex|codex v\d"),
            signatures: re_vec(&[
                r"(?m)^codex>\s*$",
                r"Token usage: total=",
                r"OpenAI Codex",
                r"/status",
            ]),
            rate_limit: re_vec(&[r"(?i)you've hit your usage limit"]),
            model: re(r"(?i)model:\s*(gpt[\w.-]+|codex[\w.-]+)"),
        },
        AgentPatterns {
            agent: AgentType::Gemini,
            banner: re(r"Gemini CLI"),
            signatures: re_vec(&[r"(?m)^gemini>\s*$", r"Gemini", r"googleapis\.com"]),
            rate_limit: re_vec(&[r"(?i)quota exceeded", r"RESOURCE_EXHAUSTED"]),
            model: re(r"(?i)model:\s*(gemini[\w.-]+)"),
        },
        AgentPatterns {
            agent: AgentType::Cursor,
            banner: re(r"Cursor Agent"),
            signatures: re_vec(&[r"(?m)^cursor>\s*$", r"Cursor Agent"]),
            rate_limit: vec![],
            model: None,
        },
        AgentPatterns {
            agent: AgentType::Windsurf,
            banner: re(r"Windsurf (?:Agent|CLI|v\d)"),
            signatures: re_vec(&[r"(?m)^windsurf>\s*$", r"Windsurf"]),
            rate_limit: vec![],
            model: None,
        },
        AgentPatterns {
            agent: AgentType::Aider,
            banner: re(r"aider v\d"),
            signatures: re_vec(&[
                r"(?m)^aider>\s*$",
                r"Added .+ to the chat",
                r"(?i)aider",
            ]),
            rate_limit: vec![],
            model: re(r"(?i)model:?\s+([\w/.-]+)\s+with"),
        },
        AgentPatterns {
            agent: AgentType::Ollama,
            banner: re(r"(?i)ollama (?:run|serve)|Ollama is running"),
            signatures: re_vec(&[r"(?m)^>>>\s", r"(?i)ollama"]),
            rate_limit: vec![],
            model: None,
        },
        AgentPatterns {
            agent: AgentType::User,
            banner: None,
            signatures: re_vec(&[r"(?m)^\w+@[\w.-]+[:\s]", r"(?m)^(?:bash|zsh)-\d"]),
            rate_limit: vec![],
            model: None,
        },
    ];

    let work_table: &[(&'static str, &str)] = &[
        (
            "file-write",
            r"(?m)^\s*(?:Writing|Wrote|Creating|Created|Editing|Updating|Updated)\s+\S+",
        ),
        ("code-fence", r"(?m)^```"),
        ("shell-echo", r"(?m)^\s*\$\s+\S+"),
        ("tool-invocation", r"(?m)^\s*(?:\u{23fa}|Running|Executing|Calling)\b"),
        ("thinking", r"(?i)(?:thinking|esc to interrupt)"),
    ];
    let work = work_table
        .iter()
        .filter_map(|(name, pat)| re(pat).map(|re| WorkPattern { name, re }))
        .collect();

    PatternSet {
        agents,
        work,
        idle: re_vec(&[
            // Bare shell or REPL prompt on its own line.
            r"^[\u{276f}>$#%]\s*$",
            // Agent REPL prompt, e.g. `codex> `, `aider> `.
            r"^[A-Za-z][\w-]*>\s*$",
            // Ollama's triple chevron.
            r"^>>>\s*$",
            // Claude's input line: chevron followed by hint text.
            r"^\u{276f}\s",
        ]),
        error: re_vec(&[
            r"(?m)^\s*error:",
            r"(?im)^\s*fatal\b",
            r"(?m)\bpanic(?:ked)?\b",
            r"Traceback \(most recent call last\)",
        ]),
        rate_limit_default: re_vec(&[
            r"(?i)rate limit",
            r"(?i)too many requests",
            r"\b429\b",
            r"(?i)quota exceeded",
            r"(?i)overloaded",
        ]),
    }
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
