// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::agent::AgentType;

use super::{builtin_presets, resolve, Mode, Preset, SynthesisStrategy};

#[test]
fn builtins_validate() {
    for preset in builtin_presets().values() {
        preset.validate().unwrap();
    }
}

#[test]
fn resolve_known_and_unknown() {
    assert_eq!(resolve("council").unwrap().modes.len(), 3);
    assert!(resolve("nonexistent").is_err());
}

#[test]
fn mode_lookup_by_id_or_code() {
    let preset = resolve("council").unwrap();
    assert_eq!(preset.mode("deductive").map(|m| m.code.as_str()), Some("DED"));
    assert_eq!(preset.mode("adv").map(|m| m.id.as_str()), Some("adversarial"));
    assert_eq!(preset.mode("ADV").map(|m| m.id.as_str()), Some("adversarial"));
    assert!(preset.mode("nope").is_none());
}

#[test]
fn prompt_rendering_substitutes_question() {
    let mode = Mode {
        id: "x".into(),
        code: "X".into(),
        agent: AgentType::Claude,
        prompt_template: "Consider: {question} carefully".into(),
    };
    assert_eq!(
        mode.render_prompt("is the cache sound?"),
        "Consider: is the cache sound? carefully"
    );
}

#[test]
fn duplicate_mode_ids_are_rejected() {
    let preset = Preset {
        name: "bad".into(),
        modes: vec![
            Mode {
                id: "a".into(),
                code: "A".into(),
                agent: AgentType::Claude,
                prompt_template: "{question}".into(),
            },
            Mode {
                id: "a".into(),
                code: "B".into(),
                agent: AgentType::Codex,
                prompt_template: "{question}".into(),
            },
        ],
        budget: Default::default(),
        strategy: SynthesisStrategy::Consensus,
    };
    assert!(preset.validate().is_err());
}

#[test]
fn strategy_round_trip() {
    for s in [
        SynthesisStrategy::Consensus,
        SynthesisStrategy::Union,
        SynthesisStrategy::Weighted,
    ] {
        assert_eq!(SynthesisStrategy::parse(s.as_str()), Some(s));
    }
    assert_eq!(SynthesisStrategy::parse("other"), None);
}
