// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::agent::{AgentType, AGENT_TYPES};

use super::patterns;

#[test]
fn every_table_entry_compiled() {
    let set = patterns();
    // One entry per agent type except Unknown (which has no signatures).
    assert_eq!(set.agents.len(), AGENT_TYPES.len() - 1);
    assert!(!set.work.is_empty());
    assert!(!set.idle.is_empty());
    assert!(!set.error.is_empty());
    assert!(!set.rate_limit_default.is_empty());
    // Exactly the five named work indicators.
    let names: Vec<_> = set.work.iter().map(|w| w.name).collect();
    assert_eq!(
        names,
        vec!["file-write", "code-fence", "shell-echo", "tool-invocation", "thinking"]
    );
}

#[test]
fn agent_entries_follow_the_total_order() {
    let set = patterns();
    let order: Vec<AgentType> = set.agents.iter().map(|a| a.agent).collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted, "agent pattern table must follow the AgentType order");
}

#[yare::parameterized(
    claude = { "Claude Code v2.1.37", AgentType::Claude },
    codex = { "OpenAI Codex (research preview)", AgentType::Codex },
    gemini = { "Gemini CLI v0.9", AgentType::Gemini },
    aider = { "aider v0.86.1", AgentType::Aider },
)]
fn banners_match(header: &str, agent: AgentType) {
    let set = patterns();
    let entry = set.agents.iter().find(|a| a.agent == agent).unwrap();
    assert!(entry.banner.as_ref().unwrap().is_match(header));
}

#[yare::parameterized(
    writing = { "Writing src/main.rs" },
    wrote = { "Wrote tests/specs.rs" },
    creating = { "Creating new module" },
    fence = { "```go" },
    shell = { "  $ cargo build" },
    tool = { "Running tests" },
)]
fn work_patterns_match(line: &str) {
    let set = patterns();
    assert!(set.work.iter().any(|w| w.re.is_match(line)), "no work match for {line:?}");
}

#[yare::parameterized(
    bare_dollar = { "$" },
    chevron = { "\u{276f}" },
    codex_repl = { "codex> " },
    aider_repl = { "aider>" },
    ollama = { ">>> " },
    claude_input = { "\u{276f} Try \"fix lint errors\"" },
)]
fn idle_patterns_match(line: &str) {
    let set = patterns();
    assert!(set.idle.iter().any(|re| re.is_match(line)), "no idle match for {line:?}");
}

#[yare::parameterized(
    mid_sentence_prompt = { "the codex> marker appears mid-line" },
    prose = { "still processing your request" },
)]
fn idle_patterns_reject(line: &str) {
    let set = patterns();
    assert!(!set.idle.iter().any(|re| re.is_match(line)));
}

#[yare::parameterized(
    error_line = { "error: expected `;`" },
    fatal = { "FATAL corruption detected" },
    panicked = { "thread 'main' panicked at src/lib.rs:10" },
    python = { "Traceback (most recent call last)" },
)]
fn error_patterns_match(line: &str) {
    let set = patterns();
    assert!(set.error.iter().any(|re| re.is_match(line)));
}

#[yare::parameterized(
    generic = { "rate limit exceeded, retrying" },
    http = { "HTTP 429 returned" },
    quota = { "Quota exceeded for model" },
)]
fn default_rate_limit_patterns_match(line: &str) {
    let set = patterns();
    assert!(set.rate_limit_default.iter().any(|re| re.is_match(line)));
}
