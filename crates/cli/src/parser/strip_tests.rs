// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::strip_ansi;

#[test]
fn passes_plain_text_through() {
    assert_eq!(strip_ansi(b"hello world\n"), "hello world\n");
}

#[yare::parameterized(
    color = { b"\x1b[31mred\x1b[0m".as_slice(), "red" },
    cursor_up = { b"line\x1b[2Amore".as_slice(), "linemore" },
    clear_line = { b"\x1b[2Ktext".as_slice(), "text" },
    bold_multi_param = { b"\x1b[1;32mok\x1b[m".as_slice(), "ok" },
)]
fn strips_csi(input: &[u8], expected: &str) {
    assert_eq!(strip_ansi(input), expected);
}

#[test]
fn strips_osc_with_bel_terminator() {
    assert_eq!(strip_ansi(b"\x1b]0;window title\x07text"), "text");
}

#[test]
fn strips_osc_with_st_terminator() {
    assert_eq!(strip_ansi(b"\x1b]2;t\x1b\\after"), "after");
}

#[test]
fn preserves_newlines_and_tabs() {
    assert_eq!(strip_ansi(b"a\x1b[31m\nb\tc\x1b[0m\n"), "a\nb\tc\n");
}

#[test]
fn drops_carriage_returns_and_bell() {
    assert_eq!(strip_ansi(b"progress\r100%\x07done"), "progress100%done");
}

#[test]
fn truncated_escape_at_end_is_swallowed() {
    assert_eq!(strip_ansi(b"ok\x1b["), "ok");
    assert_eq!(strip_ansi(b"ok\x1b"), "ok");
}

#[test]
fn multibyte_text_survives() {
    let input = "\u{276f} caf\u{e9} \u{1f680}\n".as_bytes();
    assert_eq!(strip_ansi(input), "\u{276f} caf\u{e9} \u{1f680}\n");
}

#[test]
fn invalid_utf8_is_replaced_not_panicking() {
    let out = strip_ansi(&[b'a', 0xff, 0xfe, b'b']);
    assert!(out.starts_with('a') && out.ends_with('b'));
}
