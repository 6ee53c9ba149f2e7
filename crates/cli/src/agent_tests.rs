// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{AgentType, AGENT_TYPES};

#[yare::parameterized(
    claude = { "claude", AgentType::Claude },
    claude_code = { "cc", AgentType::Claude },
    codex = { "codex", AgentType::Codex },
    codex_code = { "cod", AgentType::Codex },
    gemini = { "gmi", AgentType::Gemini },
    cursor = { "cursor", AgentType::Cursor },
    windsurf = { "wsf", AgentType::Windsurf },
    aider = { "aider", AgentType::Aider },
    ollama = { "olm", AgentType::Ollama },
    user = { "user", AgentType::User },
    unknown = { "unknown", AgentType::Unknown },
    mixed_case = { "Claude", AgentType::Claude },
)]
fn parse(input: &str, expected: AgentType) {
    assert_eq!(AgentType::parse(input), Some(expected));
}

#[test]
fn parse_rejects_garbage() {
    assert_eq!(AgentType::parse("emacs"), None);
    assert_eq!(AgentType::parse(""), None);
}

#[test]
fn total_order_matches_declaration_order() {
    for pair in AGENT_TYPES.windows(2) {
        assert!(pair[0] < pair[1], "{} must sort before {}", pair[0], pair[1]);
    }
}

#[test]
fn agent_classification() {
    assert!(AgentType::Claude.is_agent());
    assert!(AgentType::Ollama.is_agent());
    assert!(!AgentType::User.is_agent());
    assert!(!AgentType::Unknown.is_agent());
}

#[test]
fn short_codes_are_unique() {
    let mut codes: Vec<_> = AGENT_TYPES.iter().map(|t| t.short_code()).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), AGENT_TYPES.len());
}

#[test]
fn serde_wire_format_is_lowercase() -> anyhow::Result<()> {
    assert_eq!(serde_json::to_string(&AgentType::Windsurf)?, "\"windsurf\"");
    let back: AgentType = serde_json::from_str("\"aider\"")?;
    assert_eq!(back, AgentType::Aider);
    Ok(())
}
