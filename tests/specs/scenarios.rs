// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confirmation-window scenarios: confirm, auto-revert, cancel,
//! coalescing.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn confirmed_change_keeps_the_edit() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 300, 30)]);
    let path = host.file("ssh/sshd_config", "PermitRootLogin no\n");
    host.start();

    host.file("ssh/sshd_config", "PermitRootLogin yes\n");
    host.wait_for_change("ssh_1");

    host.revertit(&["confirm", "ssh_1"]).passes();
    assert_eq!(host.read(&path), "PermitRootLogin yes\n");

    // the change left the active list and cannot be confirmed twice
    let gone = wait_for(SPEC_WAIT_MAX_MS, || {
        !host.revertit(&["timeouts"]).stdout.contains("ssh_1")
    });
    assert!(gone, "confirmed change must leave the timeouts view");
    host.revertit(&["show", "ssh_1"]).passes().stdout_has("\"state\": \"confirmed\"");
    host.revertit(&["confirm", "ssh_1"]).exits(4);
}

#[test]
#[serial]
fn confirm_of_unknown_change_exits_3() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 300, 30)]);
    host.start();
    host.revertit(&["confirm", "ssh_99"]).exits(3);
}

#[test]
#[serial]
fn unconfirmed_change_auto_reverts_after_timeout_and_grace() {
    let mut host = Host::new(&[("firewall", "{etc}/ssh/*", 1, 1)]);
    let path = host.file("ssh/rules.v4", "-P INPUT ACCEPT\n");
    host.start();

    host.file("ssh/rules.v4", "-P INPUT DROP\n");
    host.wait_for_change("firewall_1");

    // deadline (1s) + grace (1s) pass without a confirm
    let reverted = wait_for(SPEC_WAIT_MAX_MS, || {
        host.read(&path) == "-P INPUT ACCEPT\n"
    });
    assert!(reverted, "file must return to pre-edit bytes");

    let cleared = wait_for(SPEC_WAIT_MAX_MS, || {
        !host.revertit(&["timeouts"]).stdout.contains("firewall_1")
    });
    assert!(cleared);
}

#[test]
#[serial]
fn last_second_confirm_during_grace_wins() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 1, 600)]);
    let path = host.file("ssh/sshd_config", "pre\n");
    host.start();

    host.file("ssh/sshd_config", "post\n");
    host.wait_for_change("ssh_1");

    // wait for GRACE (deadline is 1s), then confirm inside the window
    let in_grace = wait_for(SPEC_WAIT_MAX_MS, || {
        host.revertit(&["timeouts"]).stdout.contains("grace")
    });
    assert!(in_grace, "change must enter grace");

    host.revertit(&["confirm", "ssh_1"]).passes();
    std::thread::sleep(std::time::Duration::from_millis(500));
    assert_eq!(host.read(&path), "post\n", "confirm during grace keeps the edit");
}

#[test]
#[serial]
fn cancel_reverts_without_waiting() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 600, 30)]);
    let path = host.file("ssh/sshd_config", "pre\n");
    host.start();

    host.file("ssh/sshd_config", "post\n");
    host.wait_for_change("ssh_1");

    host.revertit(&["cancel", "ssh_1"]).passes();
    let reverted = wait_for(SPEC_WAIT_MAX_MS, || host.read(&path) == "pre\n");
    assert!(reverted, "cancel must restore immediately");
}

#[test]
#[serial]
fn edits_in_the_same_category_coalesce_into_one_change() {
    let mut host = Host::new(&[("services", "{etc}/systemd/*", 300, 30)]);
    host.file("systemd/a.service", "[Unit]\n");
    host.file("systemd/b.service", "[Unit]\n");
    host.start();

    host.file("systemd/a.service", "[Unit]\nedited=a\n");
    host.wait_for_change("services_1");
    host.file("systemd/b.service", "[Unit]\nedited=b\n");

    let merged = wait_for(SPEC_WAIT_MAX_MS, || {
        let out = host.revertit(&["timeouts"]).stdout;
        out.contains("a.service") && out.contains("b.service")
    });
    assert!(merged, "both edits must land in one change");

    let out = host.revertit(&["timeouts"]).passes().stdout;
    assert!(out.contains("services_1"));
    assert!(!out.contains("services_2"), "no second change may open:\n{out}");
}

#[test]
#[serial]
fn noop_rewrite_opens_nothing() {
    let mut host = Host::new(&[("ssh", "{etc}/ssh/*", 300, 30)]);
    host.file("ssh/sshd_config", "same\n");
    host.start();

    // identical bytes: digest matches the startup baseline
    host.file("ssh/sshd_config", "same\n");
    std::thread::sleep(std::time::Duration::from_secs(1));
    host.revertit(&["timeouts"]).passes().stdout_has("no pending changes");
}
