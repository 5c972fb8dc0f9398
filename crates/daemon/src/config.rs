// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! One TOML document. Invalid configuration is fatal at startup and
//! rejected (keeping the previous config) on reload.

use rvt_core::{Category, Policy, PolicySet, BUILTIN_CATEGORIES};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Hard ceiling on any confirmation timeout (seconds).
pub const MAX_TIMEOUT_CEILING: u64 = 1800;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("cannot parse {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    global: RawGlobal,
    #[serde(default)]
    snapshot: RawSnapshot,
    #[serde(default)]
    monitoring: HashMap<String, Vec<String>>,
    #[serde(default)]
    timeout: RawTimeout,
    #[serde(default)]
    categories: HashMap<String, RawCategory>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawGlobal {
    default_timeout: Option<u64>,
    max_timeout: Option<u64>,
    log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawSnapshot {
    enable_system_tool: Option<bool>,
    location: Option<PathBuf>,
    max_snapshots: Option<usize>,
    max_age_days: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTimeout {
    timeout_action: Option<String>,
    connectivity_check: Option<bool>,
    connectivity_endpoints: Option<Vec<String>>,
    revert_grace_period: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawCategory {
    timeout: Option<u64>,
    grace_period: Option<u64>,
    connectivity_check: Option<bool>,
    #[serde(default)]
    services: Vec<String>,
}

/// What happens when a confirmation window expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Restore the pre-change snapshot (the default).
    Revert,
    /// Log loudly and accept the change anyway.
    Warn,
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub log_level: String,
    pub snapshot_enable_system_tool: bool,
    pub snapshot_location: PathBuf,
    pub snapshot_max: usize,
    pub snapshot_max_age: Duration,
    /// Category -> glob patterns, in declaration order for builtins.
    pub monitoring: Vec<(Category, Vec<String>)>,
    pub timeout_action: TimeoutAction,
    pub connectivity_check: bool,
    pub connectivity_endpoints: Vec<String>,
    pub grace_period: Duration,
    pub policies: PolicySet,
}

impl Config {
    /// Load and validate from a TOML file.
    pub fn load(path: &Path, state_dir: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let raw: RawConfig = toml::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        Self::from_raw(raw, state_dir)
    }

    /// Defaults for a host without a config file: builtin categories
    /// with empty watch lists (the daemon runs but watches nothing).
    #[allow(clippy::unwrap_used)] // the empty raw config always validates
    pub fn fallback(state_dir: &Path) -> Self {
        Self::from_raw(
            RawConfig {
                global: RawGlobal::default(),
                snapshot: RawSnapshot::default(),
                monitoring: HashMap::new(),
                timeout: RawTimeout::default(),
                categories: HashMap::new(),
            },
            state_dir,
        )
        .unwrap()
    }

    fn from_raw(raw: RawConfig, state_dir: &Path) -> Result<Self, ConfigError> {
        let default_timeout = raw.global.default_timeout.unwrap_or(300);
        let max_timeout = raw.global.max_timeout.unwrap_or(MAX_TIMEOUT_CEILING);

        if max_timeout > MAX_TIMEOUT_CEILING {
            return Err(ConfigError::Invalid(format!(
                "global.max_timeout {max_timeout} exceeds ceiling {MAX_TIMEOUT_CEILING}"
            )));
        }
        if default_timeout == 0 || default_timeout > max_timeout {
            return Err(ConfigError::Invalid(format!(
                "global.default_timeout {default_timeout} must be in [1, {max_timeout}]"
            )));
        }

        let log_level = raw.global.log_level.unwrap_or_else(|| "INFO".to_string());
        const LEVELS: [&str; 5] = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];
        if !LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid(format!("global.log_level {log_level:?}")));
        }

        let timeout_action = match raw.timeout.timeout_action.as_deref() {
            None | Some("revert") => TimeoutAction::Revert,
            Some("warn") => TimeoutAction::Warn,
            Some(other) => {
                return Err(ConfigError::Invalid(format!("timeout.timeout_action {other:?}")))
            }
        };

        let grace_period =
            Duration::from_secs(raw.timeout.revert_grace_period.unwrap_or(30));
        let connectivity_check = raw.timeout.connectivity_check.unwrap_or(false);
        let connectivity_endpoints = raw.timeout.connectivity_endpoints.unwrap_or_default();

        let snapshot_max = raw.snapshot.max_snapshots.unwrap_or(50);
        if snapshot_max < 1 {
            return Err(ConfigError::Invalid("snapshot.max_snapshots must be >= 1".into()));
        }
        let max_age_days = raw.snapshot.max_age_days.unwrap_or(30);
        if max_age_days < 1 {
            return Err(ConfigError::Invalid("snapshot.max_age_days must be >= 1".into()));
        }

        let snapshot_location =
            raw.snapshot.location.unwrap_or_else(|| state_dir.join("snapshots"));
        if !snapshot_location.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "snapshot.location {} must be absolute",
                snapshot_location.display()
            )));
        }

        for (category, globs) in &raw.monitoring {
            for pattern in globs {
                if !pattern.starts_with('/') {
                    return Err(ConfigError::Invalid(format!(
                        "monitoring.{category} pattern {pattern:?} must be absolute"
                    )));
                }
            }
        }

        // Builtins first (classifier priority), then extra categories
        let mut monitoring: Vec<(Category, Vec<String>)> = Vec::new();
        for name in BUILTIN_CATEGORIES {
            let globs = raw.monitoring.get(name).cloned().unwrap_or_default();
            monitoring.push((Category::new(name), globs));
        }
        let mut extra: Vec<_> =
            raw.monitoring.keys().filter(|k| !BUILTIN_CATEGORIES.contains(&k.as_str())).collect();
        extra.sort();
        for name in extra {
            monitoring.push((Category::new(name.as_str()), raw.monitoring[name].clone()));
        }

        let mut policies = PolicySet::new(Duration::from_secs(default_timeout));
        for (category, _) in &monitoring {
            let raw_cat = raw.categories.get(category.as_str()).cloned().unwrap_or_default();
            let timeout_secs = raw_cat.timeout.unwrap_or(default_timeout);
            if timeout_secs == 0 || timeout_secs > max_timeout {
                return Err(ConfigError::Invalid(format!(
                    "categories.{category}.timeout {timeout_secs} must be in [1, {max_timeout}]"
                )));
            }
            policies.insert(
                category.clone(),
                Policy {
                    timeout: Duration::from_secs(timeout_secs),
                    grace_period: raw_cat
                        .grace_period
                        .map(Duration::from_secs)
                        .unwrap_or(grace_period),
                    connectivity_check: raw_cat.connectivity_check.unwrap_or(connectivity_check),
                    services: raw_cat.services,
                    coalesce_window: Policy::DEFAULT_COALESCE,
                },
            );
        }
        for name in raw.categories.keys() {
            if !monitoring.iter().any(|(c, _)| c == &name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "categories.{name} has no monitoring.{name} glob list"
                )));
            }
        }

        Ok(Self {
            default_timeout: Duration::from_secs(default_timeout),
            max_timeout: Duration::from_secs(max_timeout),
            log_level,
            snapshot_enable_system_tool: raw.snapshot.enable_system_tool.unwrap_or(false),
            snapshot_location,
            snapshot_max,
            snapshot_max_age: Duration::from_secs(max_age_days * 86_400),
            monitoring,
            timeout_action,
            connectivity_check,
            connectivity_endpoints,
            grace_period,
            policies,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
