// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change lifecycle handlers: detection, capture completion, open,
//! confirm, revert dispatch.

use crate::engine::Runtime;
use rvt_core::{
    Category, ChangeId, ChangeState, Clock, ContentDigest, Effect, Event, RevertTrigger,
    SnapshotId, TimerKind,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl<C: Clock + 'static> Runtime<C> {
    /// A debounced watcher observation.
    pub(crate) fn on_detected(
        &self,
        path: &Path,
        digest: Option<&ContentDigest>,
        at_ms: u64,
    ) -> Vec<Effect> {
        let Some(category) = self.classifier.read().classify(path).cloned() else {
            debug!(path = %path.display(), "unclassified path dropped");
            return vec![];
        };

        let state = self.state.lock();
        if state.safe_mode {
            warn!(path = %path.display(), "safe-mode: refusing to open a change");
            return vec![];
        }

        // No-op write: content matches what we already have on record
        if Self::recorded_digest(&state, path).as_ref().map(|d| d.as_ref())
            == Some(digest)
        {
            debug!(path = %path.display(), "digest unchanged, dropped");
            return vec![];
        }

        // A path belongs to at most one non-terminal change
        if let Some(covering) = state.change_covering(path) {
            let window = self.config.read().policies.for_category(&category).coalesce_window;
            if covering.category == category
                && covering.accepts_coalesce(at_ms, window.as_secs())
            {
                return vec![Effect::Emit {
                    event: Event::ChangeCoalesced {
                        change_id: covering.id.clone(),
                        path: path.to_owned(),
                        digest: digest.cloned(),
                        at_ms,
                    },
                }];
            }
            warn!(
                path = %path.display(),
                change = %covering.id,
                state = %covering.state,
                "edit on a path with an in-flight change outside its coalescing window; dropped"
            );
            return vec![];
        }

        // Same-category open change within the window: coalesce even
        // though this particular path was not yet covered
        if let Some(open) = state.open_change_for(&category) {
            let window = self.config.read().policies.for_category(&category).coalesce_window;
            if open.accepts_coalesce(at_ms, window.as_secs()) {
                return vec![Effect::Emit {
                    event: Event::ChangeCoalesced {
                        change_id: open.id.clone(),
                        path: path.to_owned(),
                        digest: digest.cloned(),
                        at_ms,
                    },
                }];
            }
        }

        // Capture already running for this category: park the event and
        // re-dispatch it once the change opens
        {
            let mut in_flight = self.captures_in_flight.lock();
            if let Some(queue) = in_flight.get_mut(&category) {
                queue.push_back(Event::ChangeDetected {
                    path: path.to_owned(),
                    digest: digest.cloned(),
                    at_ms,
                });
                return vec![];
            }
            in_flight.insert(category.clone(), VecDeque::new());
        }

        // Build the capture scope under the lock: every watched path of
        // the category plus its baseline source
        let expanded = self.classifier.read().expand_category(&category);
        let mut scope: Vec<(PathBuf, _)> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for p in expanded
            .into_iter()
            .chain(std::iter::once(path.to_owned()))
            .chain(state.baselines.keys().cloned())
        {
            if !seen.insert(p.clone()) {
                continue;
            }
            let in_category =
                p == path || self.classifier.read().classify(&p) == Some(&category);
            if !in_category {
                continue;
            }
            let source =
                state.baselines.get(&p).map(|b| (b.snapshot_id.clone(), b.digest.clone()));
            scope.push((p, source));
        }

        info!(path = %path.display(), %category, "change detected, capturing pre-change snapshot");
        vec![Effect::CapturePreChange {
            category,
            trigger_path: path.to_owned(),
            trigger_digest: digest.cloned(),
            scope,
        }]
    }

    /// Pre-change capture landed: open the change.
    pub(crate) fn on_captured(
        &self,
        category: &Category,
        snapshot_id: &SnapshotId,
        trigger_path: &Path,
        trigger_digest: Option<&ContentDigest>,
        at_ms: u64,
    ) -> Vec<Effect> {
        let parked = self.take_parked(category);

        let (change_id, timeout, grace) = {
            let state = self.state.lock();
            let policy = self.config.read().policies.for_category(category);
            (
                ChangeId::new(category, state.next_seq(category)),
                policy.timeout,
                policy.grace_period,
            )
        };

        let mut effects = vec![Effect::Emit {
            event: Event::ChangeOpened {
                change_id: change_id.clone(),
                category: category.clone(),
                path: trigger_path.to_owned(),
                digest: trigger_digest.cloned(),
                snapshot_id: snapshot_id.clone(),
                opened_at_ms: at_ms,
                deadline_ms: at_ms + timeout.as_millis() as u64,
                timeout_secs: timeout.as_secs(),
                grace_secs: grace.as_secs(),
            },
        }];
        // Events parked during the capture re-enter the queue and
        // coalesce into the change we just opened
        effects.extend(parked.into_iter().map(|event| Effect::Emit { event }));
        effects
    }

    pub(crate) fn on_capture_failed(
        &self,
        category: &Category,
        trigger_path: &Path,
        error: &str,
    ) -> Vec<Effect> {
        let dropped = self.take_parked(category).len();
        tracing::error!(
            %category,
            path = %trigger_path.display(),
            error,
            dropped,
            "SNAPSHOT CAPTURE FAILED: change not opened, edits are unprotected"
        );
        vec![]
    }

    /// The change is in state; arm its confirmation deadline.
    pub(crate) fn on_opened(&self, change_id: &ChangeId, timeout_secs: u64) -> Vec<Effect> {
        info!(%change_id, timeout_secs, "confirmation window open");
        vec![Effect::SetTimer {
            change_id: change_id.clone(),
            kind: TimerKind::Deadline,
            duration: std::time::Duration::from_secs(timeout_secs),
        }]
    }

    /// Operator (or timeout_action=warn) accepted the change.
    pub(crate) fn on_confirmed(&self, change_id: &ChangeId, actor: &str) -> Vec<Effect> {
        // The apply gate may have rejected a late confirm; only act when
        // the change really is confirmed now
        let confirmed_paths: Vec<PathBuf> = {
            let state = self.state.lock();
            match state.get_change(change_id) {
                Some(c) if c.state == ChangeState::Confirmed => c.paths.keys().cloned().collect(),
                _ => return vec![],
            }
        };
        info!(%change_id, actor, "change confirmed");

        vec![
            Effect::CancelTimer { change_id: change_id.clone(), kind: TimerKind::Deadline },
            Effect::CancelTimer { change_id: change_id.clone(), kind: TimerKind::Grace },
            // Rotate the accepted baseline to the confirmed content
            Effect::CaptureBaseline {
                paths: confirmed_paths,
                description: format!("baseline after {change_id}"),
            },
        ]
    }

    /// Transition to REVERTING was applied; start the restore worker.
    pub(crate) fn on_reverting(
        &self,
        change_id: &ChangeId,
        trigger: &RevertTrigger,
    ) -> Vec<Effect> {
        let state = self.state.lock();
        let Some(change) = state.get_change(change_id) else { return vec![] };
        if change.state != ChangeState::Reverting {
            return vec![];
        }
        info!(%change_id, ?trigger, "reverting");

        let services = self.config.read().policies.for_category(&change.category).services;
        vec![
            Effect::CancelTimer { change_id: change_id.clone(), kind: TimerKind::Deadline },
            Effect::CancelTimer { change_id: change_id.clone(), kind: TimerKind::Grace },
            Effect::ExecuteRevert {
                change_id: change_id.clone(),
                snapshot_id: change.snapshot_id.clone(),
                paths: change.paths.keys().cloned().collect(),
                services,
            },
        ]
    }

    /// Re-read configuration landed: baseline any newly watched paths.
    pub(crate) fn on_policies_reloaded(&self) -> Vec<Effect> {
        let state = self.state.lock();
        let mut missing: Vec<PathBuf> = Vec::new();
        for (_, paths) in self.classifier.read().expand() {
            for path in paths {
                if !state.baselines.contains_key(&path) && state.change_covering(&path).is_none()
                {
                    missing.push(path);
                }
            }
        }
        if missing.is_empty() {
            return vec![];
        }
        info!(count = missing.len(), "baselining newly watched paths after reload");
        vec![Effect::CaptureBaseline { paths: missing, description: "baseline after reload".into() }]
    }

    fn take_parked(&self, category: &Category) -> VecDeque<Event> {
        self.captures_in_flight.lock().remove(category).unwrap_or_default()
    }
}
