// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ledger runtime.
//!
//! Single owner of change mutation: the engine loop applies each
//! journaled event to [`LedgerState`], then asks the handlers what
//! side effects follow. Blocking work (captures, probes, reverts) runs
//! on workers whose completions come back as events, so concurrent
//! watcher events, operator commands, and timer fires all serialize
//! through one queue.

mod executor;
mod handlers;
pub(crate) mod revert;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::event_bus::EventBus;
use crate::scheduler::Scheduler;
use parking_lot::{Mutex, RwLock};
use rvt_core::{Category, Clock, ContentDigest, Effect, Event};
use rvt_probe::HostProbe;
use rvt_snapstore::{SnapshotStore, SystemSnapshotTool};
use rvt_storage::LedgerState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Adapter dependencies, detected once at startup.
pub struct RuntimeDeps {
    pub store: Arc<SnapshotStore>,
    pub probe: HostProbe,
    pub system_tool: Option<SystemSnapshotTool>,
}

/// Runtime that coordinates the ledger.
pub struct Runtime<C: Clock> {
    pub state: Arc<Mutex<LedgerState>>,
    pub scheduler: Mutex<Scheduler>,
    pub classifier: Arc<RwLock<Classifier>>,
    pub config: Arc<RwLock<Config>>,
    pub bus: EventBus,
    pub clock: C,
    pub store: Arc<SnapshotStore>,
    pub probe: HostProbe,
    pub system_tool: Option<SystemSnapshotTool>,
    /// Paths the revert engine is rewriting; the watcher skips them.
    pub suppress: Arc<Mutex<HashSet<PathBuf>>>,
    /// Categories with a pre-change capture in flight, with events that
    /// arrived meanwhile (re-dispatched once the change opens).
    captures_in_flight: Mutex<HashMap<Category, VecDeque<Event>>>,
    /// Worker handles for in-flight reverts (drained at shutdown).
    revert_tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Monotonic base for manifest `created_at_mono`.
    pub started_at: Instant,
}

impl<C: Clock + 'static> Runtime<C> {
    pub fn new(
        deps: RuntimeDeps,
        clock: C,
        state: Arc<Mutex<LedgerState>>,
        classifier: Arc<RwLock<Classifier>>,
        config: Arc<RwLock<Config>>,
        bus: EventBus,
        suppress: Arc<Mutex<HashSet<PathBuf>>>,
    ) -> Self {
        Self {
            state,
            scheduler: Mutex::new(Scheduler::new()),
            classifier,
            config,
            bus,
            clock,
            store: deps.store,
            probe: deps.probe,
            system_tool: deps.system_tool,
            suppress,
            captures_in_flight: Mutex::new(HashMap::new()),
            revert_tasks: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    /// Handle one applied event; execute whatever effects follow.
    pub async fn process(&self, event: &Event) {
        for effect in self.handle(event) {
            self.execute(effect).await;
        }
    }

    /// Pure-ish dispatch: inspect state, decide effects. No I/O here.
    fn handle(&self, event: &Event) -> Vec<Effect> {
        match event {
            Event::ChangeDetected { path, digest, at_ms } => {
                self.on_detected(path, digest.as_ref(), *at_ms)
            }
            Event::SnapshotCaptured { category, snapshot_id, trigger_path, trigger_digest, at_ms } => {
                self.on_captured(category, snapshot_id, trigger_path, trigger_digest.as_ref(), *at_ms)
            }
            Event::SnapshotCaptureFailed { category, trigger_path, error, .. } => {
                self.on_capture_failed(category, trigger_path, error)
            }
            Event::ChangeOpened { change_id, timeout_secs, .. } => {
                self.on_opened(change_id, *timeout_secs)
            }
            Event::ChangeCoalesced { change_id, path, .. } => {
                tracing::info!(%change_id, path = %path.display(), "edit coalesced, deadline unchanged");
                vec![]
            }
            Event::ChangeConfirmed { change_id, actor, .. } => self.on_confirmed(change_id, actor),
            Event::DeadlineFired { change_id, at_ms } => self.on_deadline(change_id, *at_ms),
            Event::ChangeGrace { change_id, .. } => self.on_grace_entered(change_id),
            Event::GraceFired { change_id, at_ms } => self.on_grace_fired(change_id, *at_ms),
            Event::ChangeReverting { change_id, trigger, .. } => {
                self.on_reverting(change_id, trigger)
            }
            Event::ProbeObserved { change_id, reachable, .. } => {
                tracing::info!(%change_id, reachable, "reachability observed during grace");
                vec![]
            }
            Event::ChangeReverted { change_id, .. } => {
                tracing::info!(%change_id, "change reverted");
                vec![]
            }
            Event::ChangeFailed { change_id, reason, .. } => {
                tracing::error!(%change_id, %reason, detail = reason.detail(), "REVERT FAILED: operator intervention required");
                vec![]
            }
            Event::WatcherDegraded { reason, .. } => {
                tracing::error!(reason, "watcher degraded; entering safe-mode (new changes refused)");
                vec![]
            }
            Event::PolicyReloaded { .. } => self.on_policies_reloaded(),
            Event::BaselineAccepted { .. } | Event::ChangePurged { .. } => vec![],
        }
    }

    /// Deadlines that came due; called from the engine's timer tick.
    pub fn fired_timer_events(&self) -> Vec<Event> {
        let fired = self.scheduler.lock().fired(self.clock.now());
        let at_ms = self.clock.epoch_ms();
        fired
            .into_iter()
            .map(|f| match f.kind {
                rvt_core::TimerKind::Deadline => {
                    Event::DeadlineFired { change_id: f.change_id, at_ms }
                }
                rvt_core::TimerKind::Grace => Event::GraceFired { change_id: f.change_id, at_ms },
            })
            .collect()
    }

    /// Await in-flight revert workers (bounded); used at shutdown.
    pub async fn drain_reverts(&self, limit: std::time::Duration) {
        let tasks: Vec<_> = self.revert_tasks.lock().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        let drain = async {
            for task in tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(limit, drain).await.is_err() {
            tracing::warn!("shutdown proceeded with reverts still in flight");
        }
    }

    fn send(&self, event: Event) {
        if let Err(e) = self.bus.send(event) {
            tracing::error!(error = %e, "journal append failed");
        }
    }

    /// Current digest on record for a path: an in-flight change's
    /// observation, else the accepted baseline.
    fn recorded_digest(
        state: &LedgerState,
        path: &std::path::Path,
    ) -> Option<Option<ContentDigest>> {
        if let Some(change) = state.change_covering(path) {
            return change.paths.get(path).cloned();
        }
        state.baseline_digest(path).map(|d| Some(d.clone()))
    }
}
