// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Known agent types.
///
/// The declaration order is the fixed total order used everywhere a
/// deterministic choice between types is needed (pattern-score tie-breaks,
/// stable listings). Do not reorder variants without auditing those sites.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
    Cursor,
    Windsurf,
    Aider,
    Ollama,
    User,
    Unknown,
}

/// All agent types in the fixed total order.
pub const AGENT_TYPES: [AgentType; 9] = [
    AgentType::Claude,
    AgentType::Codex,
    AgentType::Gemini,
    AgentType::Cursor,
    AgentType::Windsurf,
    AgentType::Aider,
    AgentType::Ollama,
    AgentType::User,
    AgentType::Unknown,
];

impl AgentType {
    /// Wire-format string for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::Aider => "aider",
            Self::Ollama => "ollama",
            Self::User => "user",
            Self::Unknown => "unknown",
        }
    }

    /// Short code used in pane titles and CLI flags (`--cc`, `--cod`, `--gmi`).
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Claude => "cc",
            Self::Codex => "cod",
            Self::Gemini => "gmi",
            Self::Cursor => "cur",
            Self::Windsurf => "wsf",
            Self::Aider => "aid",
            Self::Ollama => "olm",
            Self::User => "usr",
            Self::Unknown => "unk",
        }
    }

    /// Parse a type name or short code.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        AGENT_TYPES
            .iter()
            .find(|t| t.as_str() == lower || t.short_code() == lower)
            .copied()
    }

    /// Whether panes of this type host a conversational agent process
    /// (as opposed to a plain user shell or an unclassified pane).
    pub fn is_agent(&self) -> bool {
        !matches!(self, Self::User | Self::Unknown)
    }

    /// Default launch command for this agent type. Overridable via config.
    pub fn default_command(&self) -> Option<&'static str> {
        match self {
            Self::Claude => Some("claude"),
            Self::Codex => Some("codex"),
            Self::Gemini => Some("gemini"),
            Self::Cursor => Some("cursor-agent"),
            Self::Windsurf => Some("windsurf"),
            Self::Aider => Some("aider"),
            Self::Ollama => Some("ollama run"),
            // A user pane is a plain interactive shell.
            Self::User => Some("bash"),
            Self::Unknown => None,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
