// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distribution and subsystem detection.
//!
//! Reads `/etc/os-release` and checks for well-known binaries. Detection
//! never executes anything; presence of a binary is enough to pick the
//! matching capability object.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    Debian,
    Redhat,
    Suse,
    Arch,
    Alpine,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitSystem {
    Systemd,
    Openrc,
    SysvInit,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallSystem {
    Nftables,
    Iptables,
    Firewalld,
    Ufw,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkManager {
    NetworkManager,
    SystemdNetworkd,
    Netplan,
    Ifupdown,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Pacman,
    Apk,
    Unknown,
}

/// What was detected about the host. Read-only after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub distro_family: DistroFamily,
    pub distro_version: String,
    pub init_system: InitSystem,
    pub network_manager: NetworkManager,
    pub firewall_system: FirewallSystem,
    pub package_manager: PackageManager,
}

/// Detect against the live root filesystem.
pub fn detect() -> HostDescriptor {
    detect_at(Path::new("/"))
}

/// Detect against an arbitrary root (tests point this at a fixture tree).
pub fn detect_at(root: &Path) -> HostDescriptor {
    let os_release = std::fs::read_to_string(root.join("etc/os-release")).unwrap_or_default();
    let (distro_family, distro_version) = parse_os_release(&os_release);

    let has = |rel: &str| root.join(rel).exists();
    let has_bin = |name: &str| {
        ["usr/bin", "usr/sbin", "bin", "sbin"].iter().any(|dir| has(&format!("{dir}/{name}")))
    };

    let init_system = if has("run/systemd/system") || has_bin("systemctl") {
        InitSystem::Systemd
    } else if has_bin("rc-service") {
        InitSystem::Openrc
    } else if has_bin("service") || has("etc/init.d") {
        InitSystem::SysvInit
    } else {
        InitSystem::Unknown
    };

    let firewall_system = if has_bin("firewall-cmd") {
        FirewallSystem::Firewalld
    } else if has_bin("ufw") {
        FirewallSystem::Ufw
    } else if has_bin("nft") {
        FirewallSystem::Nftables
    } else if has_bin("iptables") {
        FirewallSystem::Iptables
    } else {
        FirewallSystem::None
    };

    let network_manager = if has_bin("nmcli") {
        NetworkManager::NetworkManager
    } else if has_bin("netplan") {
        NetworkManager::Netplan
    } else if has_bin("networkctl") {
        NetworkManager::SystemdNetworkd
    } else if has_bin("ifup") {
        NetworkManager::Ifupdown
    } else {
        NetworkManager::Unknown
    };

    let package_manager = if has_bin("apt-get") {
        PackageManager::Apt
    } else if has_bin("dnf") {
        PackageManager::Dnf
    } else if has_bin("yum") {
        PackageManager::Yum
    } else if has_bin("zypper") {
        PackageManager::Zypper
    } else if has_bin("pacman") {
        PackageManager::Pacman
    } else if has_bin("apk") {
        PackageManager::Apk
    } else {
        PackageManager::Unknown
    };

    HostDescriptor {
        distro_family,
        distro_version,
        init_system,
        network_manager,
        firewall_system,
        package_manager,
    }
}

/// Extract the distro family and version from os-release content.
fn parse_os_release(content: &str) -> (DistroFamily, String) {
    let mut id = String::new();
    let mut id_like = String::new();
    let mut version = String::new();

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else { continue };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "ID" => id = value.to_ascii_lowercase(),
            "ID_LIKE" => id_like = value.to_ascii_lowercase(),
            "VERSION_ID" => version = value.to_string(),
            _ => {}
        }
    }

    let family = family_of(&id)
        .or_else(|| id_like.split_whitespace().find_map(family_of))
        .unwrap_or(DistroFamily::Unknown);

    (family, version)
}

fn family_of(id: &str) -> Option<DistroFamily> {
    match id {
        "debian" | "ubuntu" | "raspbian" | "linuxmint" => Some(DistroFamily::Debian),
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" => Some(DistroFamily::Redhat),
        "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" | "suse" => {
            Some(DistroFamily::Suse)
        }
        "arch" | "manjaro" => Some(DistroFamily::Arch),
        "alpine" => Some(DistroFamily::Alpine),
        _ => None,
    }
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
