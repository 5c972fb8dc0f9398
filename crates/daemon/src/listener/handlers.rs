// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request handlers for the control surface.

use super::ListenCtx;
use crate::engine::revert;
use crate::protocol::{
    summarize, ChangeDetail, ChangeFilter, ErrorKind, Payload, Request, Response,
    SnapshotSummary, StatusInfo,
};
use crate::self_test;
use rvt_core::{
    AcceptedPath, ChangeId, ChangeState, Clock, Event, RevertTrigger, SnapshotId,
    SnapshotOrigin, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub(super) async fn dispatch(ctx: &ListenCtx, request: Request, actor: &str) -> Response {
    match request {
        Request::Ping => Response::ok(Payload::Pong),
        Request::Status => status(ctx),
        Request::ListChanges { filter } => list_changes(ctx, filter),
        Request::ShowChange { change_id } => show_change(ctx, &change_id),
        Request::Confirm { change_id } => confirm(ctx, &change_id, actor).await,
        Request::Cancel { change_id } => cancel(ctx, &change_id, actor),
        Request::SnapshotsList => snapshots_list(ctx).await,
        Request::SnapshotsCreate { description } => snapshots_create(ctx, description).await,
        Request::SnapshotsRestore { snapshot_id } => snapshots_restore(ctx, snapshot_id).await,
        Request::SelfTest => Response::ok(Payload::SelfTest(self_test::run(ctx).await)),
    }
}

fn status(ctx: &ListenCtx) -> Response {
    let state = ctx.state.lock();
    let changes = state.changes.values();
    let (mut open, mut grace, mut failed) = (0, 0, 0);
    for change in changes {
        match change.state {
            ChangeState::Open => open += 1,
            ChangeState::Grace => grace += 1,
            ChangeState::Failed => failed += 1,
            _ => {}
        }
    }
    let watched: usize = ctx.classifier.read().expand().iter().map(|(_, p)| p.len()).sum();

    Response::ok(Payload::Status(StatusInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        safe_mode: state.safe_mode,
        safe_mode_reason: state.safe_mode_reason.clone(),
        open_changes: open,
        grace_changes: grace,
        failed_changes: failed,
        watched_paths: watched,
        journal_seq: ctx.journal.lock().write_seq(),
    }))
}

fn list_changes(ctx: &ListenCtx, filter: ChangeFilter) -> Response {
    let now_ms = SystemClock.epoch_ms();
    let state = ctx.state.lock();
    let mut summaries: Vec<_> = state
        .changes
        .values()
        .filter(|c| match filter {
            ChangeFilter::Active => matches!(c.state, ChangeState::Open | ChangeState::Grace),
            ChangeFilter::All => true,
        })
        .map(|c| summarize(c, now_ms))
        .collect();
    summaries.sort_by_key(|s| s.opened_at_ms);
    Response::ok(Payload::Changes { changes: summaries })
}

fn show_change(ctx: &ListenCtx, change_id: &str) -> Response {
    let now_ms = SystemClock.epoch_ms();
    let state = ctx.state.lock();
    let Some(change) = state.get_change(&ChangeId::from_string(change_id)) else {
        return Response::error(ErrorKind::NotFound, format!("no change {change_id}"));
    };
    Response::ok(Payload::Change(ChangeDetail {
        summary: summarize(change, now_ms),
        snapshot_id: change.snapshot_id.as_str().to_string(),
        confirmed_by: change.confirmed_by.clone(),
        failure: change.failure.as_ref().map(|f| format!("{f}: {}", f.detail())),
        reachable: change.reachability.as_ref().map(|r| r.reachable),
        probe_endpoints: change
            .reachability
            .as_ref()
            .map(|r| r.endpoints.clone())
            .unwrap_or_default(),
    }))
}

/// Validate, compute the accepted digests from disk, emit the confirm.
async fn confirm(ctx: &ListenCtx, change_id: &str, actor: &str) -> Response {
    let id = ChangeId::from_string(change_id);
    let paths: Vec<PathBuf> = {
        let state = ctx.state.lock();
        match state.get_change(&id) {
            None => {
                return Response::error(ErrorKind::NotFound, format!("no change {change_id}"))
            }
            Some(c) if !c.state.is_confirmable() => {
                return Response::error(
                    ErrorKind::NotConfirmable,
                    format!("change {change_id} is {}", c.state),
                );
            }
            Some(c) => c.paths.keys().cloned().collect(),
        }
    };

    // Digest what is on disk right now; that is what the operator is
    // accepting as the new baseline
    let mut accepted = Vec::with_capacity(paths.len());
    for path in paths {
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                accepted.push(AcceptedPath { path, digest: rvt_core::digest_bytes(&bytes) })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {} // stays deleted
            Err(e) => {
                return Response::error(
                    ErrorKind::Internal,
                    format!("cannot read {}: {e}", path.display()),
                )
            }
        }
    }

    info!(change_id, actor, "confirm accepted");
    let event = Event::ChangeConfirmed {
        change_id: id,
        actor: actor.to_string(),
        accepted,
        at_ms: SystemClock.epoch_ms(),
    };
    match ctx.bus.send(event) {
        Ok(_) => Response::ok(Payload::Confirmed { change_id: change_id.to_string() }),
        Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
    }
}

/// Cancel is an immediate revert: OPEN or GRACE straight to REVERTING, skipping grace.
fn cancel(ctx: &ListenCtx, change_id: &str, actor: &str) -> Response {
    let id = ChangeId::from_string(change_id);
    {
        let state = ctx.state.lock();
        match state.get_change(&id) {
            None => {
                return Response::error(ErrorKind::NotFound, format!("no change {change_id}"))
            }
            Some(c) if !c.state.is_confirmable() => {
                return Response::error(
                    ErrorKind::NotConfirmable,
                    format!("change {change_id} is {}", c.state),
                );
            }
            Some(_) => {}
        }
    }

    info!(change_id, actor, "cancel accepted, reverting now");
    let event = Event::ChangeReverting {
        change_id: id,
        trigger: RevertTrigger::Cancel { actor: actor.to_string() },
        at_ms: SystemClock.epoch_ms(),
    };
    match ctx.bus.send(event) {
        Ok(_) => Response::ok(Payload::Cancelled { change_id: change_id.to_string() }),
        Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
    }
}

async fn snapshots_list(ctx: &ListenCtx) -> Response {
    let store = Arc::clone(&ctx.store);
    let result = tokio::task::spawn_blocking(move || store.list()).await;
    match result {
        Ok(Ok(manifests)) => Response::ok(Payload::Snapshots {
            snapshots: manifests
                .into_iter()
                .map(|m| SnapshotSummary {
                    id: m.id.as_str().to_string(),
                    created_at: m.created_at_wall.to_rfc3339(),
                    origin: m.origin.to_string(),
                    files: m.entries.len(),
                    description: m.description,
                    system_snapshot_id: m.system_snapshot_id,
                })
                .collect(),
        }),
        Ok(Err(e)) => Response::error(ErrorKind::Internal, e.to_string()),
        Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
    }
}

async fn snapshots_create(ctx: &ListenCtx, description: Option<String>) -> Response {
    let paths: Vec<PathBuf> =
        ctx.classifier.read().expand().into_iter().flat_map(|(_, p)| p).collect();
    if paths.is_empty() {
        return Response::error(ErrorKind::InvalidRequest, "no watched paths to snapshot");
    }

    let store = Arc::clone(&ctx.store);
    let result = tokio::task::spawn_blocking(move || {
        store.capture(&paths, SnapshotOrigin::Manual, description, chrono::Utc::now(), 0)
    })
    .await;

    match result {
        Ok(Ok(manifest)) => {
            info!(snapshot = %manifest.id, "manual snapshot created");
            Response::ok(Payload::SnapshotCreated { snapshot_id: manifest.id.as_str().to_string() })
        }
        Ok(Err(e)) => Response::error(ErrorKind::Internal, e.to_string()),
        Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
    }
}

/// Operator-initiated restore outside the change lifecycle. Files only -
/// no service restarts: and the restored content becomes the baseline.
async fn snapshots_restore(ctx: &ListenCtx, snapshot_id: String) -> Response {
    let id = SnapshotId::from_string(&snapshot_id);
    let store = Arc::clone(&ctx.store);
    let plan = {
        let store = Arc::clone(&store);
        let id = id.clone();
        tokio::task::spawn_blocking(move || store.restore_plan(&id, None)).await
    };
    let plan = match plan {
        Ok(Ok(plan)) => plan,
        Ok(Err(rvt_snapstore::SnapshotError::NotFound(_))) => {
            return Response::error(ErrorKind::NotFound, format!("no snapshot {snapshot_id}"))
        }
        Ok(Err(e)) => return Response::error(ErrorKind::Internal, e.to_string()),
        Err(e) => return Response::error(ErrorKind::Internal, e.to_string()),
    };

    let touched = plan.touched_paths();
    ctx.suppress.lock().extend(touched.iter().cloned());
    let files = plan.steps.len();
    let executed =
        tokio::task::spawn_blocking(move || revert::execute_file_steps(&plan)).await;
    {
        let mut suppress = ctx.suppress.lock();
        for path in &touched {
            suppress.remove(path);
        }
    }

    match executed {
        Ok(Ok(accepted)) => {
            let removed = touched
                .iter()
                .filter(|p| accepted.iter().all(|a| &a.path != *p))
                .cloned()
                .collect();
            let event = Event::BaselineAccepted {
                snapshot_id: id,
                accepted,
                removed,
                at_ms: SystemClock.epoch_ms(),
            };
            if let Err(e) = ctx.bus.send(event) {
                return Response::error(ErrorKind::Internal, e.to_string());
            }
            info!(snapshot_id, files, "manual restore complete");
            Response::ok(Payload::SnapshotRestored { snapshot_id, files })
        }
        Ok(Err(e)) => Response::error(ErrorKind::Internal, e.to_string()),
        Err(e) => Response::error(ErrorKind::Internal, e.to_string()),
    }
}
