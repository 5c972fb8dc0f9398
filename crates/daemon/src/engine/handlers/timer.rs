// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadline and grace handlers.

use crate::config::TimeoutAction;
use crate::engine::Runtime;
use rvt_core::{
    AcceptedPath, ChangeId, ChangeState, Clock, Effect, Event, RevertTrigger, TimerKind,
};
use tracing::{info, warn};

impl<C: Clock + 'static> Runtime<C> {
    /// Confirmation deadline expired. Discarded silently when the change
    /// is no longer OPEN (it raced a confirm or cancel).
    pub(crate) fn on_deadline(&self, change_id: &ChangeId, at_ms: u64) -> Vec<Effect> {
        let grace_secs = {
            let state = self.state.lock();
            match state.get_change(change_id) {
                Some(c) if c.state == ChangeState::Open => c.grace_secs,
                _ => return vec![],
            }
        };
        warn!(%change_id, grace_secs, "confirmation deadline expired, entering grace");
        vec![Effect::Emit {
            event: Event::ChangeGrace {
                change_id: change_id.clone(),
                grace_deadline_ms: at_ms + grace_secs * 1000,
            },
        }]
    }

    /// GRACE entered: arm the grace timer and, when the policy gates on
    /// connectivity, launch a probe budgeted to land before grace fires.
    pub(crate) fn on_grace_entered(&self, change_id: &ChangeId) -> Vec<Effect> {
        let (category, grace_secs) = {
            let state = self.state.lock();
            match state.get_change(change_id) {
                Some(c) if c.state == ChangeState::Grace => {
                    (c.category.clone(), c.grace_secs)
                }
                _ => return vec![],
            }
        };

        let mut effects = vec![Effect::SetTimer {
            change_id: change_id.clone(),
            kind: TimerKind::Grace,
            duration: std::time::Duration::from_secs(grace_secs),
        }];

        let config = self.config.read();
        let policy = config.policies.for_category(&category);
        if policy.connectivity_check && !config.connectivity_endpoints.is_empty() {
            effects.push(Effect::RunProbe {
                change_id: change_id.clone(),
                endpoints: config.connectivity_endpoints.clone(),
                budget: std::time::Duration::from_secs((grace_secs / 2).max(1)),
            });
        }
        effects
    }

    /// Grace expired. A confirm that entered the queue first already
    /// moved the change out of GRACE: checking state here is what makes
    /// "confirm wins" hold.
    pub(crate) fn on_grace_fired(&self, change_id: &ChangeId, at_ms: u64) -> Vec<Effect> {
        {
            let state = self.state.lock();
            match state.get_change(change_id) {
                Some(c) if c.state == ChangeState::Grace => {}
                _ => return vec![],
            }
        }

        if self.config.read().timeout_action == TimeoutAction::Warn {
            let accepted: Vec<AcceptedPath> = {
                let state = self.state.lock();
                state
                    .get_change(change_id)
                    .map(|c| {
                        c.paths
                            .iter()
                            .filter_map(|(path, digest)| {
                                digest.clone().map(|digest| AcceptedPath {
                                    path: path.clone(),
                                    digest,
                                })
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            };
            warn!(
                %change_id,
                "timeout_action=warn: UNCONFIRMED change accepted without revert"
            );
            return vec![Effect::Emit {
                event: Event::ChangeConfirmed {
                    change_id: change_id.clone(),
                    actor: "timeout-warn".into(),
                    accepted,
                    at_ms,
                },
            }];
        }

        info!(%change_id, "grace expired without confirmation, reverting");
        vec![Effect::Emit {
            event: Event::ChangeReverting {
                change_id: change_id.clone(),
                trigger: RevertTrigger::GraceExpired,
                at_ms,
            },
        }]
    }
}
