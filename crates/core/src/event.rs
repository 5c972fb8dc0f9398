// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events that drive the change ledger.
//!
//! Every input to the ledger: classified watcher events, operator
//! commands, timer fires, worker completions: is an `Event`. Events are
//! journaled before processing; `LedgerState::apply` derives state from
//! them and must stay idempotent so journal replay is safe.
//!
//! Serializes with `{"type": "topic:name", ...fields}` format.

use crate::category::Category;
use crate::change::{EndpointLatency, FailureReason, RevertTrigger};
use crate::digest::ContentDigest;
use crate::id::{ChangeId, SnapshotId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A path whose content was accepted as the new baseline on confirm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPath {
    pub path: PathBuf,
    pub digest: ContentDigest,
}

/// Events that trigger state transitions in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Debounced, classified watcher observation. A `None` digest means
    /// the path is gone (delete or move-out). Applies nothing by
    /// itself; the handler decides between open, coalesce, and drop.
    #[serde(rename = "change:detected")]
    ChangeDetected { path: PathBuf, digest: Option<ContentDigest>, at_ms: u64 },

    /// Pre-change capture finished; the handler opens the change.
    #[serde(rename = "snapshot:captured")]
    SnapshotCaptured {
        category: Category,
        snapshot_id: SnapshotId,
        trigger_path: PathBuf,
        trigger_digest: Option<ContentDigest>,
        at_ms: u64,
    },

    /// Pre-change capture failed; no change opens for the triggering edit.
    #[serde(rename = "snapshot:capture-failed")]
    SnapshotCaptureFailed { category: Category, trigger_path: PathBuf, error: String, at_ms: u64 },

    /// A confirmation window opened.
    #[serde(rename = "change:opened")]
    ChangeOpened {
        change_id: ChangeId,
        category: Category,
        path: PathBuf,
        digest: Option<ContentDigest>,
        snapshot_id: SnapshotId,
        opened_at_ms: u64,
        deadline_ms: u64,
        timeout_secs: u64,
        grace_secs: u64,
    },

    /// A further edit merged into an open change. Never moves the deadline.
    #[serde(rename = "change:coalesced")]
    ChangeCoalesced {
        change_id: ChangeId,
        path: PathBuf,
        digest: Option<ContentDigest>,
        at_ms: u64,
    },

    /// Operator accepted the change; affected paths become the new baseline.
    #[serde(rename = "change:confirmed")]
    ChangeConfirmed { change_id: ChangeId, actor: String, accepted: Vec<AcceptedPath>, at_ms: u64 },

    /// A baseline capture landed: these paths' accepted content now
    /// lives in `snapshot_id`. `removed` paths had no content to accept
    /// (tombstoned at capture).
    #[serde(rename = "baseline:accepted")]
    BaselineAccepted {
        snapshot_id: SnapshotId,
        accepted: Vec<AcceptedPath>,
        removed: Vec<PathBuf>,
        at_ms: u64,
    },

    /// Confirmation deadline expired (timer fire; applies nothing).
    #[serde(rename = "deadline:fired")]
    DeadlineFired { change_id: ChangeId, at_ms: u64 },

    /// The change entered its grace window.
    #[serde(rename = "change:grace")]
    ChangeGrace { change_id: ChangeId, grace_deadline_ms: u64 },

    /// Grace window expired (timer fire; applies nothing).
    #[serde(rename = "grace:fired")]
    GraceFired { change_id: ChangeId, at_ms: u64 },

    /// Reachability probe result. Observational: logged and surfaced,
    /// never cancels a revert.
    #[serde(rename = "probe:observed")]
    ProbeObserved {
        change_id: ChangeId,
        reachable: bool,
        endpoints: Vec<EndpointLatency>,
        at_ms: u64,
    },

    /// The change is being rolled back.
    #[serde(rename = "change:reverting")]
    ChangeReverting { change_id: ChangeId, trigger: RevertTrigger, at_ms: u64 },

    /// Rollback completed; prior content and services are back.
    #[serde(rename = "change:reverted")]
    ChangeReverted { change_id: ChangeId, at_ms: u64 },

    /// Rollback hit an unrecoverable error; operator attention required.
    #[serde(rename = "change:failed")]
    ChangeFailed { change_id: ChangeId, reason: FailureReason, at_ms: u64 },

    /// Terminal change aged out of the audit window.
    #[serde(rename = "change:purged")]
    ChangePurged { change_id: ChangeId },

    /// The watcher can no longer guarantee event delivery; ledger goes
    /// fail-closed (safe-mode).
    #[serde(rename = "watcher:degraded")]
    WatcherDegraded { reason: String, at_ms: u64 },

    /// Policies and globs were reloaded from configuration.
    #[serde(rename = "policy:reloaded")]
    PolicyReloaded { at_ms: u64 },
}

impl Event {
    /// Change this event concerns, when it concerns exactly one.
    pub fn change_id(&self) -> Option<&ChangeId> {
        match self {
            Event::ChangeOpened { change_id, .. }
            | Event::ChangeCoalesced { change_id, .. }
            | Event::ChangeConfirmed { change_id, .. }
            | Event::DeadlineFired { change_id, .. }
            | Event::ChangeGrace { change_id, .. }
            | Event::GraceFired { change_id, .. }
            | Event::ProbeObserved { change_id, .. }
            | Event::ChangeReverting { change_id, .. }
            | Event::ChangeReverted { change_id, .. }
            | Event::ChangeFailed { change_id, .. }
            | Event::ChangePurged { change_id } => Some(change_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
