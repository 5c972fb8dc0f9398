// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering for command output.

use rvt_daemon::{ChangeSummary, SnapshotSummary, StatusInfo};

pub fn render_status(status: &StatusInfo) -> String {
    let mut out = String::new();
    out.push_str(&format!("revertitd {} (up {}s)\n", status.version, status.uptime_secs));
    if status.safe_mode {
        out.push_str(&format!(
            "  SAFE-MODE: {}: new changes are refused\n",
            status.safe_mode_reason.as_deref().unwrap_or("watcher degraded")
        ));
    }
    out.push_str(&format!(
        "  watching {} file(s); {} open, {} in grace, {} failed; journal seq {}\n",
        status.watched_paths,
        status.open_changes,
        status.grace_changes,
        status.failed_changes,
        status.journal_seq
    ));
    out
}

pub fn render_changes(changes: &[ChangeSummary]) -> String {
    if changes.is_empty() {
        return "no pending changes\n".to_string();
    }
    let mut out = format!(
        "{:<16} {:<10} {:<10} {:>10}  PATHS\n",
        "CHANGE", "CATEGORY", "STATE", "REMAINING"
    );
    for change in changes {
        let paths = change
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "{:<16} {:<10} {:<10} {:>9}s  {}\n",
            change.change_id,
            change.category,
            change.state,
            change.remaining_ms / 1000,
            paths
        ));
    }
    out
}

pub fn render_snapshots(snapshots: &[SnapshotSummary]) -> String {
    if snapshots.is_empty() {
        return "no snapshots\n".to_string();
    }
    let mut out = format!(
        "{:<22} {:<26} {:<7} {:>6}  DESCRIPTION\n",
        "SNAPSHOT", "CREATED", "ORIGIN", "FILES"
    );
    for snapshot in snapshots {
        out.push_str(&format!(
            "{:<22} {:<26} {:<7} {:>6}  {}\n",
            snapshot.id,
            snapshot.created_at,
            snapshot.origin,
            snapshot.files,
            snapshot.description.as_deref().unwrap_or("-")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_change_list_says_so() {
        assert_eq!(render_changes(&[]), "no pending changes\n");
    }

    #[test]
    fn change_rows_include_id_and_seconds() {
        let rendered = render_changes(&[ChangeSummary {
            change_id: "ssh_1".into(),
            category: "ssh".into(),
            state: "open".into(),
            paths: vec!["/etc/ssh/sshd_config".into()],
            opened_at_ms: 0,
            deadline_ms: 900_000,
            remaining_ms: 840_000,
            grace_deadline_ms: None,
        }]);
        assert!(rendered.contains("ssh_1"));
        assert!(rendered.contains("840s"));
        assert!(rendered.contains("/etc/ssh/sshd_config"));
    }

    #[test]
    fn safe_mode_is_loud() {
        let rendered = render_status(&StatusInfo {
            version: "0.3.0".into(),
            uptime_secs: 5,
            safe_mode: true,
            safe_mode_reason: Some("inotify overflow".into()),
            open_changes: 0,
            grace_changes: 0,
            failed_changes: 0,
            watched_paths: 3,
            journal_seq: 9,
        });
        assert!(rendered.contains("SAFE-MODE"));
        assert!(rendered.contains("inotify overflow"));
    }
}
