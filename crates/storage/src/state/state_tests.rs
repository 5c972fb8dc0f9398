// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rvt_core::{digest_bytes, AcceptedPath, FailureReason, RevertTrigger};

fn opened(id: &str, category: &str, path: &str) -> Event {
    Event::ChangeOpened {
        change_id: ChangeId::from_string(id),
        category: Category::new(category),
        path: PathBuf::from(path),
        digest: Some(digest_bytes(path.as_bytes())),
        snapshot_id: SnapshotId::from_string("0000000001000-aaaaaa"),
        opened_at_ms: 1_000,
        deadline_ms: 901_000,
        timeout_secs: 900,
        grace_secs: 30,
    }
}

fn confirmed(id: &str, paths: &[&str]) -> Event {
    Event::ChangeConfirmed {
        change_id: ChangeId::from_string(id),
        actor: "root".into(),
        accepted: paths
            .iter()
            .map(|p| AcceptedPath { path: PathBuf::from(p), digest: digest_bytes(b"post") })
            .collect(),
        at_ms: 2_000,
    }
}

#[test]
fn open_inserts_change_and_recovers_counter() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_3", "ssh", "/etc/ssh/sshd_config"));

    let change = state.get_change(&ChangeId::from_string("ssh_3")).unwrap();
    assert_eq!(change.state, ChangeState::Open);
    assert_eq!(state.next_seq(&Category::new("ssh")), 4);
    assert!(state.change_covering(Path::new("/etc/ssh/sshd_config")).is_some());
}

#[test]
fn apply_is_idempotent_for_open() {
    let mut state = LedgerState::default();
    let event = opened("ssh_1", "ssh", "/etc/ssh/sshd_config");
    state.apply(&event);
    state.apply(&event);
    assert_eq!(state.changes.len(), 1);
}

#[test]
fn coalesce_adds_path_without_moving_deadline() {
    let mut state = LedgerState::default();
    state.apply(&opened("services_1", "services", "/etc/systemd/system/a.service"));
    state.apply(&Event::ChangeCoalesced {
        change_id: ChangeId::from_string("services_1"),
        path: PathBuf::from("/etc/systemd/system/b.service"),
        digest: Some(digest_bytes(b"b")),
        at_ms: 6_000,
    });

    let change = state.get_change(&ChangeId::from_string("services_1")).unwrap();
    assert_eq!(change.paths.len(), 2);
    assert_eq!(change.deadline_ms, 901_000);
    assert_eq!(change.last_event_ms, 6_000);
}

#[test]
fn confirm_updates_baselines() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&confirmed("ssh_1", &["/etc/ssh/sshd_config"]));

    let change = state.get_change(&ChangeId::from_string("ssh_1")).unwrap();
    assert_eq!(change.state, ChangeState::Confirmed);
    assert_eq!(change.confirmed_by.as_deref(), Some("root"));
    assert_eq!(
        state.baseline_digest(Path::new("/etc/ssh/sshd_config")),
        Some(&digest_bytes(b"post"))
    );
    assert!(state.change_covering(Path::new("/etc/ssh/sshd_config")).is_none());
}

#[test]
fn grace_then_revert_then_reverted() {
    let mut state = LedgerState::default();
    state.apply(&opened("firewall_1", "firewall", "/etc/iptables/rules.v4"));
    state.apply(&Event::ChangeGrace {
        change_id: ChangeId::from_string("firewall_1"),
        grace_deadline_ms: 931_000,
    });

    let change = state.get_change(&ChangeId::from_string("firewall_1")).unwrap();
    assert_eq!(change.state, ChangeState::Grace);
    assert_eq!(change.grace_deadline_ms, Some(931_000));

    state.apply(&Event::ChangeReverting {
        change_id: ChangeId::from_string("firewall_1"),
        trigger: RevertTrigger::GraceExpired,
        at_ms: 931_000,
    });
    state.apply(&Event::ChangeReverted {
        change_id: ChangeId::from_string("firewall_1"),
        at_ms: 932_000,
    });

    let change = state.get_change(&ChangeId::from_string("firewall_1")).unwrap();
    assert_eq!(change.state, ChangeState::Reverted);
    // baseline untouched by a revert
    assert!(state.baseline_digest(Path::new("/etc/iptables/rules.v4")).is_none());
}

#[test]
fn confirm_wins_over_replayed_grace_fire() {
    // grace:fired applies nothing; a confirm that landed first holds
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&confirmed("ssh_1", &["/etc/ssh/sshd_config"]));
    state.apply(&Event::GraceFired { change_id: ChangeId::from_string("ssh_1"), at_ms: 3_000 });
    state.apply(&Event::ChangeReverting {
        change_id: ChangeId::from_string("ssh_1"),
        trigger: RevertTrigger::GraceExpired,
        at_ms: 3_000,
    });

    assert_eq!(
        state.get_change(&ChangeId::from_string("ssh_1")).unwrap().state,
        ChangeState::Confirmed
    );
}

#[test]
fn confirm_after_reverting_is_ignored() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&Event::ChangeReverting {
        change_id: ChangeId::from_string("ssh_1"),
        trigger: RevertTrigger::Cancel { actor: "root".into() },
        at_ms: 1_500,
    });
    state.apply(&confirmed("ssh_1", &["/etc/ssh/sshd_config"]));

    assert_eq!(
        state.get_change(&ChangeId::from_string("ssh_1")).unwrap().state,
        ChangeState::Reverting
    );
    assert!(state.baselines.is_empty());
}

#[test]
fn failed_records_reason() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&Event::ChangeReverting {
        change_id: ChangeId::from_string("ssh_1"),
        trigger: RevertTrigger::GraceExpired,
        at_ms: 2_000,
    });
    state.apply(&Event::ChangeFailed {
        change_id: ChangeId::from_string("ssh_1"),
        reason: FailureReason::SnapshotCorrupt("blob missing".into()),
        at_ms: 2_500,
    });

    let change = state.get_change(&ChangeId::from_string("ssh_1")).unwrap();
    assert_eq!(change.state, ChangeState::Failed);
    assert!(matches!(change.failure, Some(FailureReason::SnapshotCorrupt(_))));
}

#[test]
fn purge_only_removes_terminal_changes() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&Event::ChangePurged { change_id: ChangeId::from_string("ssh_1") });
    assert_eq!(state.changes.len(), 1);

    state.apply(&confirmed("ssh_1", &["/etc/ssh/sshd_config"]));
    state.apply(&Event::ChangePurged { change_id: ChangeId::from_string("ssh_1") });
    assert!(state.changes.is_empty());
}

#[test]
fn purgeable_respects_audit_window() {
    let mut state = LedgerState::default();
    state.apply(&opened("ssh_1", "ssh", "/etc/ssh/sshd_config"));
    state.apply(&confirmed("ssh_1", &["/etc/ssh/sshd_config"])); // closed at 2_000

    let day_ms = 24 * 3600 * 1000;
    assert!(state.purgeable_changes(2_000 + day_ms - 1, day_ms).is_empty());
    assert_eq!(state.purgeable_changes(2_000 + day_ms, day_ms).len(), 1);
}

#[test]
fn degraded_event_sets_safe_mode() {
    let mut state = LedgerState::default();
    state.apply(&Event::WatcherDegraded { reason: "inotify overflow".into(), at_ms: 1 });
    assert!(state.safe_mode);
    assert_eq!(state.safe_mode_reason.as_deref(), Some("inotify overflow"));
}

#[test]
fn replay_prefix_equivalence() {
    // applying a journal twice yields the same change set as once
    let events = vec![
        opened("ssh_1", "ssh", "/etc/ssh/sshd_config"),
        Event::ChangeGrace {
            change_id: ChangeId::from_string("ssh_1"),
            grace_deadline_ms: 931_000,
        },
        confirmed("ssh_1", &["/etc/ssh/sshd_config"]),
        opened("firewall_1", "firewall", "/etc/iptables/rules.v4"),
    ];

    let mut once = LedgerState::default();
    for e in &events {
        once.apply(e);
    }
    let mut twice = LedgerState::default();
    for e in events.iter().chain(events.iter()) {
        twice.apply(e);
    }

    assert_eq!(once.changes.len(), twice.changes.len());
    for (id, change) in &once.changes {
        assert_eq!(twice.changes.get(id), Some(change));
    }
    assert_eq!(once.seqs, twice.seqs);
}
