// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    ssh = { "ssh", 1, "ssh_1" },
    firewall = { "firewall", 42, "firewall_42" },
    custom = { "netplan_extra", 7, "netplan_extra_7" },
)]
fn change_id_format(category: &str, seq: u64, expect: &str) {
    let id = ChangeId::new(&Category::new(category), seq);
    assert_eq!(id, expect);
}

#[test]
fn change_id_category_splits_on_last_underscore() {
    let id = ChangeId::from_string("netplan_extra_7");
    assert_eq!(id.category().unwrap().as_str(), "netplan_extra");
}

#[test]
fn snapshot_ids_sort_chronologically() {
    let a = SnapshotId::generate(1_000);
    let b = SnapshotId::generate(2_000);
    assert!(a.as_str() < b.as_str());
}

#[test]
fn snapshot_ids_are_unique_within_a_millisecond() {
    let a = SnapshotId::generate(5_000);
    let b = SnapshotId::generate(5_000);
    assert_ne!(a, b);
}

#[test]
fn origin_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&SnapshotOrigin::Manual).unwrap(), "\"manual\"");
    assert_eq!(SnapshotOrigin::Auto.to_string(), "auto");
}
