// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and recovery.
//!
//! Order matters: lock first (prevents a second daemon racing the
//! journal), then recover state (checkpoint + journal replay), then
//! reconcile deadlines and interrupted reverts, and only then open the
//! socket and start watching.

use super::{DaemonPaths, LifecycleError};
use crate::classifier::Classifier;
use crate::config::Config;
use crate::engine::{Runtime, RuntimeDeps};
use crate::event_bus::{EventBus, EventReader};
use crate::listener::ListenCtx;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use rvt_core::{ChangeState, Clock, Effect, SystemClock, TimerKind};
use rvt_probe::HostProbe;
use rvt_snapstore::{SnapshotStore, SystemSnapshotTool};
use rvt_storage::{load_checkpoint, Journal, JournalError, LedgerState};
use std::collections::HashSet;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Everything `main` needs after a successful startup.
pub struct StartupResult {
    pub runtime: Arc<Runtime<SystemClock>>,
    pub reader: EventReader,
    pub listen_ctx: Arc<ListenCtx>,
    pub socket: UnixListener,
    /// Held for the daemon's lifetime.
    pub lock_file: std::fs::File,
}

pub async fn startup(
    paths: &DaemonPaths,
    force_reset: bool,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Lock first - prevents two daemons racing over journal and socket.
    // Open without truncating so a failed lock leaves the holder's pid.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // Configuration: a missing file means "watch nothing" (packaging
    // installs the config separately); an invalid file is fatal
    let config = if paths.config.exists() {
        Config::load(&paths.config, &paths.state_dir)?
    } else {
        warn!(path = %paths.config.display(), "no configuration file, watching nothing");
        Config::fallback(&paths.state_dir)
    };

    let store = Arc::new(SnapshotStore::open(&config.snapshot_location)?);
    let swept = store.sweep_incomplete()?;
    if !swept.is_empty() {
        info!(count = swept.len(), "removed interrupted snapshot captures");
    }

    // Recover ledger state: checkpoint, then journal replay after it
    let (mut state, processed_seq) = match load_checkpoint(&paths.checkpoint) {
        Ok(Some(checkpoint)) => {
            info!(
                seq = checkpoint.seq,
                changes = checkpoint.state.changes.len(),
                "loaded checkpoint"
            );
            (checkpoint.state, checkpoint.seq)
        }
        Ok(None) => (LedgerState::default(), 0),
        Err(e) if force_reset => {
            warn!(error = %e, "checkpoint unreadable, discarded (--force-reset)");
            let _ = std::fs::remove_file(&paths.checkpoint);
            (LedgerState::default(), 0)
        }
        Err(e) => return Err(LifecycleError::ReplayInconsistent(e.to_string())),
    };

    let mut journal = match Journal::open(&paths.journal, processed_seq) {
        Ok(journal) => journal,
        Err(JournalError::Inconsistent(msg)) if force_reset => {
            warn!(msg, "journal inconsistent, discarded (--force-reset)");
            let _ = std::fs::remove_file(&paths.journal);
            let _ = std::fs::remove_file(&paths.checkpoint);
            state = LedgerState::default();
            Journal::open(&paths.journal, 0)?
        }
        Err(JournalError::Inconsistent(msg)) => {
            return Err(LifecycleError::ReplayInconsistent(msg))
        }
        Err(e) => return Err(e.into()),
    };

    let mut replayed = 0usize;
    while let Some(entry) = journal.next_unprocessed() {
        state.apply(&entry.event);
        journal.mark_processed(entry.seq);
        replayed += 1;
    }
    if replayed > 0 {
        info!(replayed, seq = journal.processed_seq(), "replayed journal entries");
    }
    info!(
        changes = state.changes.len(),
        baselines = state.baselines.len(),
        safe_mode = state.safe_mode,
        "recovered ledger state"
    );
    // A fresh watcher starts with this process; degraded state does not
    // carry across restarts
    state.safe_mode = false;
    state.safe_mode_reason = None;

    let (bus, reader) = EventBus::new(journal);
    let state = Arc::new(Mutex::new(state));
    let classifier = Arc::new(RwLock::new(Classifier::compile(&config.monitoring)));
    let config = Arc::new(RwLock::new(config));
    let suppress = Arc::new(Mutex::new(HashSet::new()));

    let probe = HostProbe::detect();
    info!(descriptor = ?probe.descriptor, "host detected");
    let system_tool =
        config.read().snapshot_enable_system_tool.then(SystemSnapshotTool::detect).flatten();

    let runtime = Arc::new(Runtime::new(
        RuntimeDeps { store: Arc::clone(&store), probe: probe.clone(), system_tool },
        SystemClock,
        Arc::clone(&state),
        Arc::clone(&classifier),
        Arc::clone(&config),
        bus.clone(),
        Arc::clone(&suppress),
    ));

    reconcile(&runtime).await;

    // Baseline every watched path not covered by an in-flight change:
    // content on disk at startup is the de-facto accepted state
    let baseline_paths: Vec<_> = {
        let state = state.lock();
        classifier
            .read()
            .expand()
            .into_iter()
            .flat_map(|(_, paths)| paths)
            .filter(|p| state.change_covering(p).is_none())
            .collect()
    };
    if !baseline_paths.is_empty() {
        runtime
            .execute(Effect::CaptureBaseline {
                paths: baseline_paths,
                description: "startup baseline".into(),
            })
            .await;
    }

    // Socket last: only accept operators once recovery is done
    if paths.socket.exists() {
        std::fs::remove_file(&paths.socket)?;
    }
    if let Some(parent) = paths.socket.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let socket = UnixListener::bind(&paths.socket)?;
    std::fs::set_permissions(&paths.socket, std::fs::Permissions::from_mode(0o600))?;

    let listen_ctx = Arc::new(ListenCtx {
        bus,
        state,
        journal: reader.journal(),
        store,
        classifier,
        config,
        suppress,
        probe,
        start_time: Instant::now(),
    });

    Ok(StartupResult { runtime, reader, listen_ctx, socket, lock_file })
}

/// Re-arm deadlines and resume interrupted reverts from recovered state.
async fn reconcile(runtime: &Runtime<SystemClock>) {
    let now_ms = runtime.clock.epoch_ms();
    let active: Vec<_> = {
        let state = runtime.state.lock();
        state.active_changes().into_iter().cloned().collect()
    };

    for change in active {
        match change.state {
            ChangeState::Open => {
                let remaining = change.remaining_ms(now_ms);
                info!(change = %change.id, remaining_ms = remaining, "re-arming deadline");
                runtime
                    .execute(Effect::SetTimer {
                        change_id: change.id.clone(),
                        kind: TimerKind::Deadline,
                        duration: std::time::Duration::from_millis(remaining.max(1)),
                    })
                    .await;
            }
            ChangeState::Grace => {
                let remaining =
                    change.grace_deadline_ms.unwrap_or(now_ms).saturating_sub(now_ms);
                info!(change = %change.id, remaining_ms = remaining, "re-arming grace");
                runtime
                    .execute(Effect::SetTimer {
                        change_id: change.id.clone(),
                        kind: TimerKind::Grace,
                        duration: std::time::Duration::from_millis(remaining.max(1)),
                    })
                    .await;
            }
            ChangeState::Reverting => {
                warn!(change = %change.id, "resuming interrupted revert");
                let services = runtime
                    .config
                    .read()
                    .policies
                    .for_category(&change.category)
                    .services;
                runtime
                    .execute(Effect::ExecuteRevert {
                        change_id: change.id.clone(),
                        snapshot_id: change.snapshot_id.clone(),
                        paths: change.paths.keys().cloned().collect(),
                        services,
                    })
                    .await;
            }
            _ => {}
        }
    }
}
