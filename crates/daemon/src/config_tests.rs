// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn parse(text: &str) -> Result<Config, ConfigError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, text).unwrap();
    Config::load(&path, &dir.path().join("state"))
}

const FULL: &str = r#"
[global]
default_timeout = 120
max_timeout = 900
log_level = "DEBUG"

[snapshot]
enable_system_tool = false
location = "/var/lib/meshadmin-revertit/snapshots"
max_snapshots = 10
max_age_days = 7

[monitoring]
ssh = ["/etc/ssh/sshd_config", "/etc/ssh/sshd_config.d/*.conf"]
firewall = ["/etc/iptables/*.v4"]

[timeout]
timeout_action = "revert"
connectivity_check = true
connectivity_endpoints = ["8.8.8.8", "1.1.1.1"]
revert_grace_period = 30

[categories.ssh]
timeout = 900
services = ["sshd"]

[categories.firewall]
timeout = 300
grace_period = 45
"#;

#[test]
fn full_config_parses() {
    let config = parse(FULL).unwrap();

    assert_eq!(config.default_timeout, Duration::from_secs(120));
    assert_eq!(config.timeout_action, TimeoutAction::Revert);
    assert_eq!(config.connectivity_endpoints.len(), 2);

    let ssh = config.policies.for_category(&Category::new("ssh"));
    assert_eq!(ssh.timeout, Duration::from_secs(900));
    assert_eq!(ssh.grace_period, Duration::from_secs(30));
    assert_eq!(ssh.services, vec!["sshd"]);
    assert!(ssh.connectivity_check);

    let firewall = config.policies.for_category(&Category::new("firewall"));
    assert_eq!(firewall.grace_period, Duration::from_secs(45));
}

#[test]
fn builtin_categories_always_present_and_first() {
    let config = parse("[monitoring]\ncustom = [\"/etc/custom/*.conf\"]\n").unwrap();
    let names: Vec<_> = config.monitoring.iter().map(|(c, _)| c.as_str().to_string()).collect();
    assert_eq!(names[..5], ["network", "ssh", "firewall", "services", "other"]);
    assert_eq!(names[5], "custom");
}

#[test]
fn unconfigured_category_uses_default_timeout() {
    let config = parse("[global]\ndefault_timeout = 77\n").unwrap();
    let network = config.policies.for_category(&Category::new("network"));
    assert_eq!(network.timeout, Duration::from_secs(77));
}

#[parameterized(
    zero_default = { "[global]\ndefault_timeout = 0\n" },
    default_over_max = { "[global]\ndefault_timeout = 600\nmax_timeout = 300\n" },
    max_over_ceiling = { "[global]\nmax_timeout = 3600\n" },
    bad_level = { "[global]\nlog_level = \"TRACE\"\n" },
    bad_action = { "[timeout]\ntimeout_action = \"explode\"\n" },
    relative_glob = { "[monitoring]\nssh = [\"etc/ssh/*\"]\n" },
    relative_location = { "[snapshot]\nlocation = \"snapshots\"\n" },
    zero_snapshots = { "[snapshot]\nmax_snapshots = 0\n" },
    policy_without_globs = { "[categories.dns]\ntimeout = 60\n" },
    category_timeout_over_max = { "[global]\nmax_timeout = 300\n[categories.ssh]\ntimeout = 900\n" },
    unknown_key = { "[global]\ntimeout = 5\n" },
)]
fn invalid_configs_are_rejected(text: &str) {
    assert!(parse(text).is_err());
}

#[test]
fn warn_action_parses() {
    let config = parse("[timeout]\ntimeout_action = \"warn\"\n").unwrap();
    assert_eq!(config.timeout_action, TimeoutAction::Warn);
}

#[test]
fn fallback_watches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::fallback(dir.path());
    assert!(config.monitoring.iter().all(|(_, globs)| globs.is_empty()));
    assert_eq!(config.snapshot_location, dir.path().join("snapshots"));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::load(&dir.path().join("nope.toml"), dir.path());
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}
