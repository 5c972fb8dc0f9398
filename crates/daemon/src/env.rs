// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment knobs and fixed paths.
//!
//! Production deployments use the compiled-in defaults; tests and
//! packaging override through `REVERTIT_*` variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SOCKET: &str = "/run/meshadmin-revertit.sock";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/meshadmin-revertit";
pub const DEFAULT_CONFIG: &str = "/etc/meshadmin-revertit/config.toml";
pub const DEFAULT_LOG_DIR: &str = "/var/log/meshadmin-revertit";

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

fn env_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

pub fn socket_path() -> PathBuf {
    env_path("REVERTIT_SOCKET", DEFAULT_SOCKET)
}

pub fn state_dir() -> PathBuf {
    env_path("REVERTIT_STATE_DIR", DEFAULT_STATE_DIR)
}

pub fn config_path() -> PathBuf {
    env_path("REVERTIT_CONFIG", DEFAULT_CONFIG)
}

pub fn log_dir() -> PathBuf {
    env_path("REVERTIT_LOG_DIR", DEFAULT_LOG_DIR)
}

/// Scheduler poll resolution (default 1s).
///
/// Created once outside the engine loop: recreating it per iteration
/// would reset the interval on every event and starve timers.
pub fn timer_check_interval() -> Duration {
    env_ms("REVERTIT_TIMER_CHECK_MS").unwrap_or(Duration::from_secs(1))
}

/// Watcher debounce quiet window (default 500ms).
pub fn debounce_window() -> Duration {
    env_ms("REVERTIT_DEBOUNCE_MS").unwrap_or(Duration::from_millis(500))
}

/// Housekeeping cadence: audit purge, retention, checkpoint threshold.
pub fn housekeeping_interval() -> Duration {
    env_ms("REVERTIT_HOUSEKEEPING_MS").unwrap_or(Duration::from_secs(60))
}

/// Audit window for terminal changes before purge (default 24h).
pub fn audit_window() -> Duration {
    env_ms("REVERTIT_AUDIT_WINDOW_MS").unwrap_or(Duration::from_secs(24 * 3600))
}

/// Journal size that triggers a checkpoint + compaction (default 4 MiB).
pub fn journal_compact_threshold() -> u64 {
    std::env::var("REVERTIT_JOURNAL_COMPACT_BYTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4 * 1024 * 1024)
}
