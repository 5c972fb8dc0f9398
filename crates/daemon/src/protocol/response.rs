// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use rvt_core::{EndpointLatency, PendingChange};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Machine-readable error kinds; the CLI maps these to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    NotConfirmable,
    SafeMode,
    Internal,
    InvalidRequest,
}

/// One pending change, as listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub change_id: String,
    pub category: String,
    pub state: String,
    pub paths: Vec<PathBuf>,
    pub opened_at_ms: u64,
    pub deadline_ms: u64,
    /// Milliseconds until the relevant deadline (grace when in GRACE),
    /// zero when past due or terminal.
    pub remaining_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_deadline_ms: Option<u64>,
}

/// Full detail for `ShowChange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetail {
    #[serde(flatten)]
    pub summary: ChangeSummary,
    pub snapshot_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probe_endpoints: Vec<EndpointLatency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: String,
    pub created_at: String,
    pub origin: String,
    pub files: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_snapshot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub version: String,
    pub uptime_secs: u64,
    pub safe_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_mode_reason: Option<String>,
    pub open_changes: usize,
    pub grace_changes: usize,
    pub failed_changes: usize,
    pub watched_paths: usize,
    pub journal_seq: u64,
}

/// One `self_test` capability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckItem {
    pub name: String,
    pub ok: bool,
    pub required: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestReport {
    pub ok: bool,
    pub checks: Vec<CheckItem>,
}

impl SelfTestReport {
    pub fn from_checks(checks: Vec<CheckItem>) -> Self {
        Self { ok: checks.iter().all(|c| c.ok || !c.required), checks }
    }
}

/// Successful response payloads, tagged inside `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Pong,
    Status(StatusInfo),
    // Sequence payloads are struct variants; the internally tagged
    // representation cannot carry a bare list
    Changes { changes: Vec<ChangeSummary> },
    Change(ChangeDetail),
    Confirmed { change_id: String },
    Cancelled { change_id: String },
    Snapshots { snapshots: Vec<SnapshotSummary> },
    SnapshotCreated { snapshot_id: String },
    SnapshotRestored { snapshot_id: String, files: usize },
    SelfTest(SelfTestReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

/// Response from daemon to CLI.
///
/// Wire shape: `{"ok": true, "value": {...}}` or
/// `{"ok": false, "error": {"kind": "...", "message": "..."}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(value: Payload) -> Self {
        Self { ok: true, value: Some(value), error: None }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { ok: false, value: None, error: Some(ErrorBody { kind, message: message.into() }) }
    }
}

/// Build a summary from ledger state (shared by list and show).
pub fn summarize(change: &PendingChange, now_ms: u64) -> ChangeSummary {
    let remaining_ms = if change.is_terminal() {
        0
    } else {
        match change.grace_deadline_ms {
            Some(grace) => grace.saturating_sub(now_ms),
            None => change.deadline_ms.saturating_sub(now_ms),
        }
    };
    ChangeSummary {
        change_id: change.id.as_str().to_string(),
        category: change.category.as_str().to_string(),
        state: change.state.to_string(),
        paths: change.paths.keys().cloned().collect(),
        opened_at_ms: change.opened_at_ms,
        deadline_ms: change.deadline_ms,
        remaining_ms,
        grace_deadline_ms: change.grace_deadline_ms,
    }
}
