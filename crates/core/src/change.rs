// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending changes and their state machine.
//!
//! A [`PendingChange`] is one in-flight confirmation window covering one
//! or more edits to paths of a single category. It is born OPEN, reaches
//! a terminal state exactly once, and is retained for an audit window
//! after closing. All mutation happens in the ledger's apply path.

use crate::category::Category;
use crate::digest::ContentDigest;
use crate::id::{ChangeId, SnapshotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// State of a pending change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    Open,
    Grace,
    Reverting,
    Confirmed,
    Reverted,
    Failed,
}

crate::simple_display! {
    ChangeState {
        Open => "open",
        Grace => "grace",
        Reverting => "reverting",
        Confirmed => "confirmed",
        Reverted => "reverted",
        Failed => "failed",
    }
}

impl ChangeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Reverted | Self::Failed)
    }

    /// Whether `confirm` is accepted in this state.
    pub fn is_confirmable(self) -> bool {
        matches!(self, Self::Open | Self::Grace)
    }
}

/// What forced a change into REVERTING.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum RevertTrigger {
    /// Operator cancel: immediate revert, GRACE skipped.
    Cancel { actor: String },
    /// Grace window expired without a confirm.
    GraceExpired,
}

/// Why a revert ended in FAILED. Requires operator intervention;
/// the ledger never retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum FailureReason {
    SnapshotCorrupt(String),
    RestoreIo(String),
    ServiceRestartPermanent(String),
}

crate::simple_display! {
    FailureReason {
        SnapshotCorrupt(..) => "snapshot-corrupt",
        RestoreIo(..) => "restore-io",
        ServiceRestartPermanent(..) => "service-restart-permanent",
    }
}

impl FailureReason {
    pub fn detail(&self) -> &str {
        match self {
            Self::SnapshotCorrupt(d) | Self::RestoreIo(d) | Self::ServiceRestartPermanent(d) => d,
        }
    }
}

/// Latency of one probe endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLatency {
    pub endpoint: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Outcome of a reachability probe, valid only within the grace window
/// it was observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityObservation {
    pub reachable: bool,
    pub endpoints: Vec<EndpointLatency>,
    pub observed_at_ms: u64,
}

/// One in-flight confirmation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    pub id: ChangeId,
    pub category: Category,
    /// Affected paths with the digest observed on their most recent
    /// event (`None` when the path was deleted).
    pub paths: BTreeMap<PathBuf, Option<ContentDigest>>,
    /// Pre-change snapshot backing the revert.
    pub snapshot_id: SnapshotId,
    pub state: ChangeState,
    pub opened_at_ms: u64,
    /// Wall-clock deadline, fixed at open. Used to re-arm the monotonic
    /// timer after a restart; never moved by coalescing.
    pub deadline_ms: u64,
    pub timeout_secs: u64,
    pub grace_secs: u64,
    /// Most recent event folded into this change (coalescing window).
    pub last_event_ms: u64,
    /// Set only while in GRACE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_deadline_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachability: Option<ReachabilityObservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// When the change reached a terminal state (audit retention clock).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at_ms: Option<u64>,
}

impl PendingChange {
    /// Whether an event observed at `at_ms` may coalesce into this change.
    pub fn accepts_coalesce(&self, at_ms: u64, window_secs: u64) -> bool {
        self.state == ChangeState::Open && at_ms.saturating_sub(self.last_event_ms) <= window_secs * 1000
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Remaining wall-clock time until the deadline, zero if past due.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms.saturating_sub(now_ms)
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;
