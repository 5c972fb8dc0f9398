// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized ledger state from journal replay.

mod changes;

use rvt_core::{Category, ChangeId, ChangeState, ContentDigest, Event, PendingChange, SnapshotId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Last accepted content of a watched path. Rotates on CONFIRMED
/// transitions only; a revert restores the same baseline it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathBaseline {
    pub digest: ContentDigest,
    pub snapshot_id: SnapshotId,
}

/// State built by applying journal events in order.
///
/// # Idempotency Requirement
///
/// **All event handlers MUST be idempotent.** Applying the same event
/// twice must produce the same state as applying it once: recovery
/// replays events that may already be reflected in a checkpoint.
/// Guard inserts with existence checks, gate transitions on the current
/// state, and prefer assignment over arithmetic.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    /// All retained changes, keyed by change id.
    pub changes: HashMap<ChangeId, PendingChange>,
    /// Per-path accepted baselines (digest + backing snapshot).
    pub baselines: HashMap<PathBuf, PathBaseline>,
    /// Highest allocated change sequence per category.
    pub seqs: HashMap<Category, u64>,
    /// Fail-closed flag: no new changes open while degraded.
    #[serde(default)]
    pub safe_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_mode_reason: Option<String>,
}

impl LedgerState {
    /// Apply an event to derive state changes. Events are facts about
    /// what happened; this is the only place state mutates.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::ChangeOpened { .. }
            | Event::ChangeCoalesced { .. }
            | Event::ChangeConfirmed { .. }
            | Event::ChangeGrace { .. }
            | Event::ChangeReverting { .. }
            | Event::ChangeReverted { .. }
            | Event::ChangeFailed { .. }
            | Event::ChangePurged { .. }
            | Event::ProbeObserved { .. } => changes::apply(self, event),

            Event::BaselineAccepted { snapshot_id, accepted, removed, .. } => {
                for entry in accepted {
                    self.baselines.insert(
                        entry.path.clone(),
                        PathBaseline {
                            digest: entry.digest.clone(),
                            snapshot_id: snapshot_id.clone(),
                        },
                    );
                }
                for path in removed {
                    self.baselines.remove(path);
                }
            }

            Event::WatcherDegraded { reason, .. } => {
                self.safe_mode = true;
                self.safe_mode_reason = Some(reason.clone());
            }

            // Inputs handled by the runtime, no state of their own
            Event::ChangeDetected { .. }
            | Event::SnapshotCaptured { .. }
            | Event::SnapshotCaptureFailed { .. }
            | Event::DeadlineFired { .. }
            | Event::GraceFired { .. }
            | Event::PolicyReloaded { .. } => {}
        }
    }

    pub fn get_change(&self, id: &ChangeId) -> Option<&PendingChange> {
        self.changes.get(id)
    }

    /// The non-terminal change covering `path`, if any. Invariant: at
    /// most one exists.
    pub fn change_covering(&self, path: &Path) -> Option<&PendingChange> {
        self.changes.values().find(|c| !c.is_terminal() && c.paths.contains_key(path))
    }

    /// The open (coalescible) change for a category, if any.
    pub fn open_change_for(&self, category: &Category) -> Option<&PendingChange> {
        self.changes
            .values()
            .find(|c| c.state == ChangeState::Open && c.category == *category)
    }

    /// Allocate the next change sequence for a category. Runtime-only;
    /// replay recovers counters from `change:opened` events.
    pub fn next_seq(&self, category: &Category) -> u64 {
        self.seqs.get(category).copied().unwrap_or(0) + 1
    }

    pub fn baseline_digest(&self, path: &Path) -> Option<&ContentDigest> {
        self.baselines.get(path).map(|b| &b.digest)
    }

    /// Changes in a non-terminal state, oldest first.
    pub fn active_changes(&self) -> Vec<&PendingChange> {
        let mut active: Vec<_> = self.changes.values().filter(|c| !c.is_terminal()).collect();
        active.sort_by_key(|c| c.opened_at_ms);
        active
    }

    /// Terminal changes whose audit window has passed.
    pub fn purgeable_changes(&self, now_ms: u64, audit_window_ms: u64) -> Vec<ChangeId> {
        self.changes
            .values()
            .filter(|c| {
                c.is_terminal()
                    && c.closed_at_ms
                        .is_some_and(|closed| now_ms.saturating_sub(closed) >= audit_window_ms)
            })
            .map(|c| c.id.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
