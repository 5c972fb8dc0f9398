// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Which changes `ListChanges` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFilter {
    /// OPEN and GRACE changes (the `timeouts` view).
    #[default]
    Active,
    /// Everything still in the audit window.
    All,
}

/// Request from CLI to daemon.
///
/// Wire shape: `{"op": "...", "args": {...}}` (no `args` for nullary ops).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Daemon status summary
    Status,

    /// List pending changes
    ListChanges {
        #[serde(default)]
        filter: ChangeFilter,
    },

    /// Full detail for one change
    ShowChange { change_id: String },

    /// Accept a change; its content becomes the new baseline
    Confirm { change_id: String },

    /// Reject a change; revert immediately, skipping GRACE
    Cancel { change_id: String },

    /// List snapshots, newest first
    SnapshotsList,

    /// Capture a manual snapshot of every watched path
    SnapshotsCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },

    /// Restore a snapshot outside the change lifecycle
    SnapshotsRestore { snapshot_id: String },

    /// Probe daemon capabilities
    SelfTest,
}
