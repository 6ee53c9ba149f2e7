// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session naming rules.
//!
//! A session is named `base` or `base--label`. The `--` separator is
//! reserved: base names must never contain it, labels are plain
//! alphanumerics. Violations are rejected before any side effect.

use crate::error::{NtmError, Result};

/// Maximum label length in bytes.
pub const MAX_LABEL_LEN: usize = 50;

/// Separator between base project name and label.
pub const LABEL_SEPARATOR: &str = "--";

/// A validated session name, split into base and optional label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionName {
    base: String,
    label: Option<String>,
}

impl SessionName {
    /// Build a session name from a base and optional label, validating both.
    pub fn new(base: &str, label: Option<&str>) -> Result<Self> {
        validate_base(base)?;
        if let Some(l) = label {
            validate_label(l)?;
        }
        Ok(Self { base: base.to_owned(), label: label.map(str::to_owned) })
    }

    /// Parse a full session name, splitting on the label separator.
    pub fn parse(full: &str) -> Result<Self> {
        match full.split_once(LABEL_SEPARATOR) {
            Some((base, label)) => Self::new(base, Some(label)),
            None => Self::new(full, None),
        }
    }

    /// The base project name (used as the project directory).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The optional label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The full session name: `base` or `base--label`.
    pub fn full(&self) -> String {
        match &self.label {
            Some(l) => format!("{}{LABEL_SEPARATOR}{l}", self.base),
            None => self.base.clone(),
        }
    }
}

impl std::fmt::Display for SessionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full())
    }
}

/// Validate a base project name: non-empty, `[A-Za-z0-9_-]`, no `--`.
pub fn validate_base(base: &str) -> Result<()> {
    if base.is_empty() {
        return Err(NtmError::Validation("project name must not be empty".into()));
    }
    if base.contains(LABEL_SEPARATOR) {
        return Err(NtmError::Validation(format!(
            "project name {base:?} must not contain the reserved separator \"--\""
        )));
    }
    if !base.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(NtmError::Validation(format!(
            "project name {base:?} may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Validate a label: 1–50 alphanumeric characters.
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return Err(NtmError::Validation(format!(
            "label {label:?} must be 1-{MAX_LABEL_LEN} characters"
        )));
    }
    if !label.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(NtmError::Validation(format!(
            "label {label:?} may only contain letters and digits"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
