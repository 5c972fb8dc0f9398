// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watcher.
//!
//! Arms inotify on the parent directories of every configured pattern
//! (editors rename temp files over the target, so watching the file
//! inode alone misses the common write path). Raw events are debounced
//! per path with a quiet window; one `change:detected` is emitted per
//! path once it goes quiet. Paths under active restore are suppressed.
//!
//! When notify reports an error (queue overflow, watch loss) the task
//! emits `watcher:degraded` and the ledger goes fail-closed.

use crate::classifier::Classifier;
use crate::event_bus::EventBus;
use notify::{Event as FsEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::{Mutex, RwLock};
use rvt_core::{digest_bytes, Clock, Event};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Raw signal out of the notify callback.
enum Raw {
    Touched(PathBuf),
    Degraded(String),
}

/// Handle used by the engine to re-arm after a configuration reload.
pub struct WatcherHandle {
    reload_tx: mpsc::Sender<()>,
}

impl WatcherHandle {
    pub fn rearm(&self) {
        let _ = self.reload_tx.try_send(());
    }
}

/// Spawn the watcher task.
pub fn spawn<C: Clock + 'static>(
    bus: EventBus,
    classifier: Arc<RwLock<Classifier>>,
    suppress: Arc<Mutex<HashSet<PathBuf>>>,
    clock: C,
    debounce: Duration,
) -> WatcherHandle {
    let (reload_tx, reload_rx) = mpsc::channel(1);
    tokio::spawn(watch_loop(bus, classifier, suppress, clock, debounce, reload_rx));
    WatcherHandle { reload_tx }
}

fn interesting(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Remove(_)
            | EventKind::Any
            | EventKind::Other
    )
}

/// Build a notify watcher feeding `raw_tx`, armed on the classifier's
/// current roots.
fn arm(
    classifier: &Classifier,
    raw_tx: mpsc::UnboundedSender<Raw>,
) -> notify::Result<RecommendedWatcher> {
    let tx = raw_tx.clone();
    let mut watcher =
        notify::recommended_watcher(move |result: Result<FsEvent, notify::Error>| match result {
            Ok(event) => {
                if interesting(&event.kind) {
                    for path in event.paths {
                        let _ = tx.send(Raw::Touched(path));
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Raw::Degraded(e.to_string()));
            }
        })?;

    let mut armed = 0usize;
    for root in classifier.watch_roots() {
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => armed += 1,
            Err(e) => warn!(root = %root.display(), error = %e, "cannot watch directory"),
        }
    }
    info!(roots = armed, "watcher armed");
    Ok(watcher)
}

async fn watch_loop<C: Clock>(
    bus: EventBus,
    classifier: Arc<RwLock<Classifier>>,
    suppress: Arc<Mutex<HashSet<PathBuf>>>,
    clock: C,
    debounce: Duration,
    mut reload_rx: mpsc::Receiver<()>,
) {
    let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();

    let mut watcher = match arm(&classifier.read(), raw_tx.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            report_degraded(&bus, &clock, &format!("watcher init failed: {e}"));
            None
        }
    };

    // Path -> instant its quiet window closes
    let mut pending: HashMap<PathBuf, tokio::time::Instant> = HashMap::new();

    loop {
        let next_flush = pending.values().min().copied();
        tokio::select! {
            raw = raw_rx.recv() => {
                match raw {
                    Some(Raw::Touched(path)) => {
                        // Only paths that classify are worth debouncing
                        if classifier.read().classify(&path).is_none() {
                            continue;
                        }
                        if suppress.lock().contains(&path) {
                            debug!(path = %path.display(), "suppressed during restore");
                            continue;
                        }
                        pending.insert(path, tokio::time::Instant::now() + debounce);
                    }
                    Some(Raw::Degraded(reason)) => {
                        error!(reason, "filesystem notification degraded");
                        report_degraded(&bus, &clock, &reason);
                    }
                    None => return, // channel gone: daemon shutting down
                }
            }
            _ = flush_timer(next_flush) => {
                let now = tokio::time::Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, at)| **at <= now)
                    .map(|(p, _)| p.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    if suppress.lock().contains(&path) {
                        continue;
                    }
                    emit_detected(&bus, &clock, path);
                }
            }
            _ = reload_rx.recv() => {
                info!("re-arming watcher after configuration reload");
                drop(watcher.take());
                match arm(&classifier.read(), raw_tx.clone()) {
                    Ok(w) => watcher = Some(w),
                    Err(e) => report_degraded(&bus, &clock, &format!("re-arm failed: {e}")),
                }
            }
        }
    }
}

/// Sleep until the earliest quiet window closes; park forever when
/// nothing is pending.
async fn flush_timer(at: Option<tokio::time::Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn emit_detected<C: Clock>(bus: &EventBus, clock: &C, path: PathBuf) {
    let digest = match std::fs::read(&path) {
        Ok(bytes) => Some(digest_bytes(&bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable watched file");
            return;
        }
    };
    debug!(path = %path.display(), absent = digest.is_none(), "debounced change");
    if let Err(e) =
        bus.send(Event::ChangeDetected { path, digest, at_ms: clock.epoch_ms() })
    {
        error!(error = %e, "cannot journal watcher event");
    }
}

fn report_degraded<C: Clock>(bus: &EventBus, clock: &C, reason: &str) {
    let _ = bus.send(Event::WatcherDegraded {
        reason: reason.to_string(),
        at_ms: clock.epoch_ms(),
    });
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
