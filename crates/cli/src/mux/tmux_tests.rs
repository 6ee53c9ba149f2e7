// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{classify_tmux_error, parse_pane_line};
use crate::mux::{MuxError, PaneId};

#[yare::parameterized(
    no_server = { "no server running on /tmp/tmux-1000/default" },
    missing_binary = { "tmux: command not found" },
)]
fn unavailable_errors(stderr: &str) {
    assert!(matches!(classify_tmux_error(stderr), MuxError::Unavailable(_)));
}

#[yare::parameterized(
    missing_session = { "can't find session: myproj" },
    missing_pane = { "can't find pane: %7" },
)]
fn not_found_errors(stderr: &str) {
    assert!(matches!(classify_tmux_error(stderr), MuxError::NotFound(_)));
}

#[test]
fn denied_error() {
    assert!(matches!(
        classify_tmux_error("open terminal failed: permission denied"),
        MuxError::Denied(_)
    ));
}

#[test]
fn unknown_errors_are_transient() {
    assert!(matches!(
        classify_tmux_error("lost server connection"),
        MuxError::Transient(_)
    ));
}

#[test]
fn parses_pane_listing_line() {
    let pane = parse_pane_line("%3\t2\tmyproj__cc_1\tclaude").unwrap();
    assert_eq!(pane.id, PaneId("%3".to_owned()));
    assert_eq!(pane.index, 2);
    assert_eq!(pane.title, "myproj__cc_1");
    assert_eq!(pane.command, "claude");
}

#[test]
fn pane_line_with_missing_fields_is_skipped() {
    assert!(parse_pane_line("%3").is_none());
    assert!(parse_pane_line("garbage\tnot-a-number\tx\ty").is_none());
}
