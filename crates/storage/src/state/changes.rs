// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event application for pending changes.

use super::{LedgerState, PathBaseline};
use rvt_core::{ChangeState, Event, PendingChange};
use std::collections::BTreeMap;
use tracing::warn;

pub(super) fn apply(state: &mut LedgerState, event: &Event) {
    match event {
        Event::ChangeOpened {
            change_id,
            category,
            path,
            digest,
            snapshot_id,
            opened_at_ms,
            deadline_ms,
            timeout_secs,
            grace_secs,
        } => {
            // Recover the per-category counter from the id suffix
            if let Some((_, seq)) = change_id.as_str().rsplit_once('_') {
                if let Ok(seq) = seq.parse::<u64>() {
                    let counter = state.seqs.entry(category.clone()).or_insert(0);
                    *counter = (*counter).max(seq);
                }
            }

            if state.changes.contains_key(change_id) {
                return; // replayed
            }
            let mut paths = BTreeMap::new();
            paths.insert(path.clone(), digest.clone());
            state.changes.insert(
                change_id.clone(),
                PendingChange {
                    id: change_id.clone(),
                    category: category.clone(),
                    paths,
                    snapshot_id: snapshot_id.clone(),
                    state: ChangeState::Open,
                    opened_at_ms: *opened_at_ms,
                    deadline_ms: *deadline_ms,
                    timeout_secs: *timeout_secs,
                    grace_secs: *grace_secs,
                    last_event_ms: *opened_at_ms,
                    grace_deadline_ms: None,
                    reachability: None,
                    confirmed_by: None,
                    failure: None,
                    closed_at_ms: None,
                },
            );
        }

        Event::ChangeCoalesced { change_id, path, digest, at_ms } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if change.state == ChangeState::Open {
                    change.paths.insert(path.clone(), digest.clone());
                    change.last_event_ms = change.last_event_ms.max(*at_ms);
                }
            }
        }

        Event::ChangeConfirmed { change_id, actor, accepted, at_ms } => {
            let Some(change) = state.changes.get_mut(change_id) else { return };
            if !change.state.is_confirmable() {
                return; // lost the race against grace:fired, or replayed
            }
            change.state = ChangeState::Confirmed;
            change.confirmed_by = Some(actor.clone());
            change.closed_at_ms = Some(*at_ms);
            change.grace_deadline_ms = None;

            let snapshot_id = change.snapshot_id.clone();
            for path in accepted {
                state.baselines.insert(
                    path.path.clone(),
                    PathBaseline { digest: path.digest.clone(), snapshot_id: snapshot_id.clone() },
                );
            }
        }

        Event::ChangeGrace { change_id, grace_deadline_ms } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if change.state == ChangeState::Open {
                    change.state = ChangeState::Grace;
                    change.grace_deadline_ms = Some(*grace_deadline_ms);
                }
            }
        }

        Event::ChangeReverting { change_id, .. } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if change.state.is_confirmable() {
                    change.state = ChangeState::Reverting;
                    change.grace_deadline_ms = None;
                }
            }
        }

        Event::ChangeReverted { change_id, at_ms } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if change.state == ChangeState::Reverting {
                    change.state = ChangeState::Reverted;
                    change.closed_at_ms = Some(*at_ms);
                }
            }
        }

        Event::ChangeFailed { change_id, reason, at_ms } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if !change.is_terminal() {
                    change.state = ChangeState::Failed;
                    change.failure = Some(reason.clone());
                    change.closed_at_ms = Some(*at_ms);
                }
            }
        }

        Event::ChangePurged { change_id } => {
            match state.changes.get(change_id) {
                Some(change) if change.is_terminal() => {
                    state.changes.remove(change_id);
                }
                Some(change) => {
                    warn!(%change_id, state = %change.state, "refusing to purge active change")
                }
                None => {}
            }
        }

        Event::ProbeObserved { change_id, reachable, endpoints, at_ms } => {
            if let Some(change) = state.changes.get_mut(change_id) {
                if !change.is_terminal() {
                    change.reachability = Some(rvt_core::ReachabilityObservation {
                        reachable: *reachable,
                        endpoints: endpoints.clone(),
                        observed_at_ms: *at_ms,
                    });
                }
            }
        }

        _ => {}
    }
}
