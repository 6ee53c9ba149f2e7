// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-path reservations: soft locks expressing that an agent intends to
//! modify files matching a pattern, so concurrent agents do not clobber one
//! another. The table never touches the filesystem.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wildmatch::WildMatch;

use crate::error::{NtmError, Result};

/// One held reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub project: String,
    /// Holder identity (agent or dispatcher name).
    pub agent: String,
    pub pattern: String,
    pub exclusive: bool,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

/// Whether two glob patterns can claim a common path.
///
/// Approximated by matching each pattern against the other's literal text;
/// exact glob-intersection is not needed for a soft lock.
fn overlaps(a: &str, b: &str) -> bool {
    a == b || WildMatch::new(a).matches(b) || WildMatch::new(b).matches(a)
}

/// In-process reservation table.
#[derive(Default)]
pub struct ReservationTable {
    inner: Mutex<Vec<Reservation>>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire or renew a reservation.
    ///
    /// Renewal: the same agent re-requesting the same pattern keeps the
    /// reservation's identity and extends `expires_at`. Conflicts: an
    /// overlapping reservation held by another agent where either side is
    /// exclusive.
    pub fn acquire(
        &self,
        project: &str,
        agent: &str,
        pattern: &str,
        exclusive: bool,
        reason: &str,
        ttl: Duration,
    ) -> Result<Reservation> {
        if ttl <= Duration::zero() {
            return Err(NtmError::Validation("reservation ttl must be positive".into()));
        }
        let now = Utc::now();
        let mut table = self.inner.lock();
        table.retain(|r| r.expires_at > now);

        // Renewal keeps identity.
        if let Some(existing) = table.iter_mut().find(|r| {
            r.project == project && r.agent == agent && r.pattern == pattern
        }) {
            existing.expires_at = now + ttl;
            existing.exclusive = exclusive;
            return Ok(existing.clone());
        }

        let conflict = table.iter().find(|r| {
            r.project == project
                && r.agent != agent
                && (r.exclusive || exclusive)
                && overlaps(&r.pattern, pattern)
        });
        if let Some(held) = conflict {
            return Err(NtmError::Reservation(format!(
                "pattern {pattern:?} conflicts with {held_pattern:?} held by {agent}",
                held_pattern = held.pattern,
                agent = held.agent,
            )));
        }

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            project: project.to_owned(),
            agent: agent.to_owned(),
            pattern: pattern.to_owned(),
            exclusive,
            reason: reason.to_owned(),
            expires_at: now + ttl,
        };
        table.push(reservation.clone());
        Ok(reservation)
    }

    /// Release by id. Unknown ids are a no-op.
    pub fn release(&self, id: &str) {
        self.inner.lock().retain(|r| r.id != id);
    }

    /// Live reservations for a project, expired ones purged.
    pub fn active(&self, project: &str) -> Vec<Reservation> {
        let now = Utc::now();
        let mut table = self.inner.lock();
        table.retain(|r| r.expires_at > now);
        table.iter().filter(|r| r.project == project).cloned().collect()
    }

    /// Pairs of overlapping claims by different agents where at least one
    /// side is exclusive. Normally empty; shared-then-exclusive races and
    /// `proceed` policy sends can produce entries.
    pub fn conflicts(&self, project: &str) -> Vec<(Reservation, Reservation)> {
        let active = self.active(project);
        let mut out = Vec::new();
        for (i, a) in active.iter().enumerate() {
            for b in active.iter().skip(i + 1) {
                if a.agent != b.agent
                    && (a.exclusive || b.exclusive)
                    && overlaps(&a.pattern, &b.pattern)
                {
                    out.push((a.clone(), b.clone()));
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "reservation_tests.rs"]
mod tests;
