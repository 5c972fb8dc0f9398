// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: filesystem layout, startup, recovery.

mod startup;

pub use startup::{startup, StartupResult};

use std::path::PathBuf;
use thiserror::Error;

/// Resolved filesystem layout for one daemon instance.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub state_dir: PathBuf,
    pub socket: PathBuf,
    pub lock: PathBuf,
    pub journal: PathBuf,
    pub checkpoint: PathBuf,
    pub config: PathBuf,
    pub log_dir: PathBuf,
}

impl DaemonPaths {
    /// Defaults plus `REVERTIT_*` overrides.
    pub fn resolve() -> Self {
        let state_dir = crate::env::state_dir();
        Self {
            socket: crate::env::socket_path(),
            lock: state_dir.join("revertitd.pid"),
            journal: state_dir.join("ledger.log"),
            checkpoint: state_dir.join("checkpoint.json"),
            config: crate::env::config_path(),
            log_dir: crate::env::log_dir(),
            state_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another revertitd holds the lock")]
    LockFailed(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("snapshot store: {0}")]
    Snapshot(#[from] rvt_snapstore::SnapshotError),

    #[error("ledger replay inconsistent: {0} (use --force-reset to discard)")]
    ReplayInconsistent(String),

    #[error("journal: {0}")]
    Journal(#[from] rvt_storage::JournalError),
}
