// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::TempDir;
use yare::parameterized;

fn fixture(os_release: &str, bins: &[&str]) -> TempDir {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("etc")).unwrap();
    fs::write(root.path().join("etc/os-release"), os_release).unwrap();
    fs::create_dir_all(root.path().join("usr/bin")).unwrap();
    for bin in bins {
        fs::write(root.path().join("usr/bin").join(bin), "").unwrap();
    }
    root
}

#[test]
fn detects_debian_with_systemd() {
    let root = fixture(
        "ID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"24.04\"\n",
        &["systemctl", "apt-get", "ufw", "netplan"],
    );
    let d = detect_at(root.path());

    assert_eq!(d.distro_family, DistroFamily::Debian);
    assert_eq!(d.distro_version, "24.04");
    assert_eq!(d.init_system, InitSystem::Systemd);
    assert_eq!(d.firewall_system, FirewallSystem::Ufw);
    assert_eq!(d.network_manager, NetworkManager::Netplan);
    assert_eq!(d.package_manager, PackageManager::Apt);
}

#[test]
fn empty_root_detects_nothing() {
    let root = TempDir::new().unwrap();
    let d = detect_at(root.path());

    assert_eq!(d.distro_family, DistroFamily::Unknown);
    assert_eq!(d.init_system, InitSystem::Unknown);
    assert_eq!(d.firewall_system, FirewallSystem::None);
}

#[parameterized(
    rocky = { "ID=rocky\n", DistroFamily::Redhat },
    alpine = { "ID=alpine\n", DistroFamily::Alpine },
    arch = { "ID=arch\n", DistroFamily::Arch },
    leap = { "ID=opensuse-leap\n", DistroFamily::Suse },
    unknown = { "ID=plan9\n", DistroFamily::Unknown },
)]
fn family_from_id(os_release: &str, family: DistroFamily) {
    let root = fixture(os_release, &[]);
    assert_eq!(detect_at(root.path()).distro_family, family);
}

#[test]
fn id_like_is_the_fallback() {
    let root = fixture("ID=pop\nID_LIKE=\"ubuntu debian\"\n", &[]);
    assert_eq!(detect_at(root.path()).distro_family, DistroFamily::Debian);
}

#[test]
fn firewalld_outranks_iptables() {
    let root = fixture("ID=centos\n", &["firewall-cmd", "iptables"]);
    assert_eq!(detect_at(root.path()).firewall_system, FirewallSystem::Firewalld);
}

#[test]
fn detection_is_deterministic() {
    let root = fixture("ID=debian\nVERSION_ID=12\n", &["systemctl"]);
    assert_eq!(detect_at(root.path()), detect_at(root.path()));
}
