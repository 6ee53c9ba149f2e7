// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ErrorKind, NtmError};

#[yare::parameterized(
    validation = { NtmError::Validation("bad name".into()), ErrorKind::Validation, 1 },
    not_found = { NtmError::NotFound("session x".into()), ErrorKind::NotFound, 1 },
    unavailable = { NtmError::Unavailable("tmux missing".into()), ErrorKind::Unavailable, 1 },
    transient = { NtmError::Transient("io".into()), ErrorKind::Transient, 1 },
    preflight = { NtmError::PreflightBlocked(2), ErrorKind::PreflightBlocked, 2 },
    reservation = { NtmError::Reservation("src/**".into()), ErrorKind::Reservation, 1 },
    busy = { NtmError::Busy("queue full".into()), ErrorKind::Busy, 1 },
    fatal = { NtmError::Fatal("corrupt checkpoint".into()), ErrorKind::Fatal, 1 },
)]
fn kind_and_exit_code(err: NtmError, kind: ErrorKind, exit: i32) {
    assert_eq!(err.kind(), kind);
    assert_eq!(err.kind().exit_code(), exit);
}

#[test]
fn blocked_by_secret_formats_category_summary_only() {
    let err = NtmError::BlockedBySecret {
        summary: vec![("PASSWORD".to_owned(), 1), ("API_KEY".to_owned(), 2)],
    };
    let msg = err.to_string();
    assert!(msg.contains("PASSWORD=1"));
    assert!(msg.contains("API_KEY=2"));
}

#[test]
fn retryable_kinds() {
    assert!(NtmError::Transient("x".into()).is_retryable());
    assert!(NtmError::Unavailable("x".into()).is_retryable());
    assert!(!NtmError::Validation("x".into()).is_retryable());
    assert!(!NtmError::Fatal("x".into()).is_retryable());
}

#[test]
fn json_payload_shape() {
    let err = NtmError::NotFound("run abc".into());
    let json = err.to_json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "not_found");
    assert!(json["error"].as_str().is_some_and(|s| s.contains("run abc")));
}

#[test]
fn kind_serde_wire_format() -> anyhow::Result<()> {
    let s = serde_json::to_string(&ErrorKind::BlockedBySecret)?;
    assert_eq!(s, "\"blocked_by_secret\"");
    let back: ErrorKind = serde_json::from_str(&s)?;
    assert_eq!(back, ErrorKind::BlockedBySecret);
    Ok(())
}
