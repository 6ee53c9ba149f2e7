// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{parse, sort_by_priority, BatchPrompt};

#[test]
fn separator_format_with_priorities() {
    let content = "# priority: 0\nCritical fix\n---\n# priority: 2\nMedium task\n---\nNo priority\n";
    let mut prompts = parse(content).unwrap();

    assert_eq!(prompts.len(), 3);
    assert_eq!(
        prompts.iter().map(|p| p.priority).collect::<Vec<_>>(),
        vec![Some(0), Some(2), None]
    );

    sort_by_priority(&mut prompts);
    let order: Vec<&str> = prompts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(order, vec!["Critical fix", "Medium task", "No priority"]);
}

#[test]
fn line_format_one_prompt_per_line() {
    let content = "first task\nsecond task\n\nthird task\n";
    let prompts = parse(content).unwrap();
    assert_eq!(
        prompts.iter().map(|p| p.text.as_str()).collect::<Vec<_>>(),
        vec!["first task", "second task", "third task"]
    );
}

#[test]
fn multi_line_prompts_preserved_in_separator_format() {
    let content = "Explain this code:\nfn main() {}\n---\nSecond prompt\n";
    let prompts = parse(content).unwrap();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].text, "Explain this code:\nfn main() {}");
}

#[test]
fn comments_are_stripped() {
    let content = "# a header comment\ndo the thing\n# trailing note\n";
    let prompts = parse(content).unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].text, "do the thing");
}

#[test]
fn empty_batch_is_an_error() {
    assert!(parse("").is_err());
    assert!(parse("# only comments\n# here\n").is_err());
    assert!(parse("---\n---\n").is_err());
}

#[test]
fn sort_is_stable_for_equal_priorities() {
    let mut prompts = vec![
        BatchPrompt { text: "b-first".into(), priority: Some(1) },
        BatchPrompt { text: "a-unset".into(), priority: None },
        BatchPrompt { text: "b-second".into(), priority: Some(1) },
        BatchPrompt { text: "top".into(), priority: Some(0) },
        BatchPrompt { text: "b-third".into(), priority: Some(1) },
    ];
    sort_by_priority(&mut prompts);
    let order: Vec<&str> = prompts.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(order, vec!["top", "b-first", "b-second", "b-third", "a-unset"]);
}

#[test]
fn out_of_range_priority_is_rejected() {
    assert!(parse("# priority: 5\ntask\n").is_err());
    assert!(parse("# priority: nine\ntask\n").is_err());
}

#[test]
fn priority_binds_to_the_immediately_following_prompt() {
    let content = "# priority: 1\nfirst\nsecond\n";
    let prompts = parse(content).unwrap();
    assert_eq!(prompts[0].priority, Some(1));
    assert_eq!(prompts[1].priority, None);
}
