// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs: reachability, restart recovery, self-test.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn status_without_daemon_exits_2() {
    let host = Host::new(&[("ssh", "{etc}/ssh/*", 60, 30)]);
    host.revertit(&["status"]).exits(2);
}

#[test]
#[serial]
fn status_reports_watched_paths() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 60, 30)]);
    host.file("ssh/sshd_config", "PermitRootLogin no\n");
    host.start();

    host.revertit(&["status"]).passes().stdout_has("watching 1 file(s)");
}

#[test]
#[serial]
fn open_change_survives_a_crash() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 300, 30)]);
    let path = host.file("ssh/sshd_config", "PermitRootLogin no\n");
    host.start();

    host.file("ssh/sshd_config", "PermitRootLogin yes\n");
    host.wait_for_change("ssh_1");

    // crash, restart: journal replay brings the change back
    host.kill();
    host.start();
    host.revertit(&["timeouts"]).passes().stdout_has("ssh_1");

    // and it is still confirmable
    host.revertit(&["confirm", "ssh_1"]).passes();
    assert_eq!(host.read(&path), "PermitRootLogin yes\n");
}

#[test]
#[serial]
fn self_test_emits_machine_readable_report() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 60, 30)]);
    host.file("ssh/sshd_config", "x\n");
    host.start();

    let result = host.revertit(&["test"]);
    let report: serde_json::Value =
        serde_json::from_str(&result.stdout).expect("self-test output is JSON");
    let checks = report["checks"].as_array().expect("checks array");
    assert!(checks.iter().any(|c| c["name"] == "snapshot-store" && c["ok"] == true));
    assert!(checks.iter().any(|c| c["name"] == "watcher" && c["ok"] == true));
}

#[test]
#[serial]
fn second_daemon_refuses_to_start() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 60, 30)]);
    host.start();

    let second = host.run_daemon_foreground();
    assert_ne!(second.code, 0, "second daemon must refuse the lock");
    assert!(second.stderr.contains("already running"), "stderr:\n{}", second.stderr);
}
