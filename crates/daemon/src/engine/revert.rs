// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Revert execution.
//!
//! Files first, services last: a partially restored set of files with
//! the old services still running is strictly safer than new services
//! running against new files. Step execution is idempotent: every
//! write is keyed by content digest, so re-running a plan that
//! partially succeeded (crash recovery) converges.

use crate::event_bus::EventBus;
use parking_lot::Mutex;
use rvt_core::{
    digest_bytes, AcceptedPath, ChangeId, Event, FailureReason, SnapshotId,
};
use rvt_probe::{RestartOutcome, ServiceControl};
use rvt_snapstore::{RestorePlan, RestoreStep, SnapshotError, SnapshotStore};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// File-step retries beyond the first attempt.
const FILE_RETRIES: u32 = 2;
/// Service-restart retries for transient failures.
const SERVICE_RETRIES: u32 = 2;

pub(crate) struct RevertCtx {
    pub store: Arc<SnapshotStore>,
    pub bus: EventBus,
    pub suppress: Arc<Mutex<HashSet<PathBuf>>>,
    pub service_control: Option<ServiceControl>,
    pub wall_ms: u64,
}

/// Execute the restore for one change and report the terminal event.
pub(crate) async fn run(
    ctx: RevertCtx,
    change_id: ChangeId,
    snapshot_id: SnapshotId,
    paths: Vec<PathBuf>,
    services: Vec<String>,
) {
    let outcome = run_inner(&ctx, &change_id, &snapshot_id, &paths, &services).await;
    let event = match outcome {
        Ok(accepted) => {
            let removed = paths
                .iter()
                .filter(|p| accepted.iter().all(|a| &a.path != *p))
                .cloned()
                .collect();
            // Two events: the terminal transition, then the baseline
            // statement that the restored content is the accepted content
            if let Err(e) = ctx.bus.send(Event::BaselineAccepted {
                snapshot_id: snapshot_id.clone(),
                accepted,
                removed,
                at_ms: ctx.wall_ms,
            }) {
                error!(error = %e, "cannot journal baseline after revert");
            }
            Event::ChangeReverted { change_id: change_id.clone(), at_ms: ctx.wall_ms }
        }
        Err(reason) => Event::ChangeFailed {
            change_id: change_id.clone(),
            reason,
            at_ms: ctx.wall_ms,
        },
    };
    if let Err(e) = ctx.bus.send(event) {
        error!(error = %e, "cannot journal revert outcome");
    }
}

async fn run_inner(
    ctx: &RevertCtx,
    change_id: &ChangeId,
    snapshot_id: &SnapshotId,
    paths: &[PathBuf],
    services: &[String],
) -> Result<Vec<AcceptedPath>, FailureReason> {
    // 1. Build (and verify) the plan
    let plan = build_plan(ctx, snapshot_id, paths).await?;

    // 2. Suppress watcher events on everything we are about to touch
    let touched: Vec<PathBuf> = plan.touched_paths();
    ctx.suppress.lock().extend(touched.iter().cloned());
    let _lift = SuppressGuard { suppress: Arc::clone(&ctx.suppress), paths: touched };

    info!(%change_id, steps = plan.steps.len(), "executing restore plan");

    // 3. Files, with bounded retries
    let accepted = {
        let plan = plan.clone();
        tokio::task::spawn_blocking(move || execute_file_steps(&plan))
            .await
            .map_err(|join| FailureReason::RestoreIo(format!("restore worker died: {join}")))??
    };

    // 4. Services, in policy order, only after every file is back
    if let Some(control) = &ctx.service_control {
        let mut done = HashSet::new();
        for service in services {
            if !done.insert(service.clone()) {
                continue;
            }
            restart_with_retries(control, service).await?;
        }
    } else if !services.is_empty() {
        return Err(FailureReason::ServiceRestartPermanent(
            "no init system detected to restart services".into(),
        ));
    }

    Ok(accepted)
}

async fn build_plan(
    ctx: &RevertCtx,
    snapshot_id: &SnapshotId,
    paths: &[PathBuf],
) -> Result<RestorePlan, FailureReason> {
    let store = Arc::clone(&ctx.store);
    let id = snapshot_id.clone();
    let scope = paths.to_vec();
    let mut plan = tokio::task::spawn_blocking(move || store.restore_plan(&id, Some(&scope)))
        .await
        .map_err(|join| FailureReason::RestoreIo(format!("plan worker died: {join}")))?
        .map_err(|e| match e {
            SnapshotError::Corrupt { .. } | SnapshotError::NotFound(_) => {
                FailureReason::SnapshotCorrupt(e.to_string())
            }
            other => FailureReason::RestoreIo(other.to_string()),
        })?;

    // Paths the snapshot knows nothing about did not exist pre-change:
    // the restore removes them
    let covered: HashSet<_> = plan.touched_paths().into_iter().collect();
    for path in paths {
        if !covered.contains(path) {
            plan.steps.push(RestoreStep::RemoveFile { path: path.clone() });
        }
    }
    Ok(plan)
}

/// Run the file steps in order. The plan aborts on the first persistent
/// failure; files restored earlier stay restored ("no worse than
/// before").
pub(crate) fn execute_file_steps(plan: &RestorePlan) -> Result<Vec<AcceptedPath>, FailureReason> {
    let mut accepted = Vec::new();
    for step in &plan.steps {
        let mut attempt = 0;
        loop {
            match execute_step(step) {
                Ok(()) => break,
                Err(e) if attempt < FILE_RETRIES => {
                    attempt += 1;
                    warn!(path = %step.path().display(), error = %e, attempt, "restore step failed, retrying");
                    std::thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
                Err(e) => {
                    return Err(FailureReason::RestoreIo(format!(
                        "{}: {e}",
                        step.path().display()
                    )))
                }
            }
        }
        if let RestoreStep::WriteFile { path, digest, .. } = step {
            accepted.push(AcceptedPath { path: path.clone(), digest: digest.clone() });
        }
    }
    Ok(accepted)
}

fn execute_step(step: &RestoreStep) -> std::io::Result<()> {
    match step {
        RestoreStep::WriteFile { path, blob, digest, mode, uid, gid } => {
            let current_matches = std::fs::read(path)
                .map(|bytes| digest_bytes(&bytes) == *digest)
                .unwrap_or(false);

            if !current_matches {
                let payload = rvt_snapstore::read_blob_file(blob)?;
                write_atomic(path, &payload)?;
            }
            restore_attributes(path, *mode, *uid, *gid)
        }
        RestoreStep::RemoveFile { path } => match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        },
    }
}

/// Temp-write + fsync + rename beside the target, so concurrent readers
/// always see a complete file.
fn write_atomic(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.rvt-restore"));
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(payload)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

fn restore_attributes(path: &Path, mode: u32, uid: u32, gid: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    // chown requires privilege; outside root (tests) ownership already
    // matches the writing user
    if is_root() {
        std::os::unix::fs::chown(path, Some(uid), Some(gid))?;
    }
    Ok(())
}

fn is_root() -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self").map(|m| m.uid() == 0).unwrap_or(false)
}

async fn restart_with_retries(
    control: &ServiceControl,
    service: &str,
) -> Result<(), FailureReason> {
    let mut attempt = 0;
    loop {
        match control.restart(service).await {
            RestartOutcome::Ok => {
                info!(service, "service restarted");
                return Ok(());
            }
            RestartOutcome::TransientFailure { detail } if attempt < SERVICE_RETRIES => {
                attempt += 1;
                warn!(service, detail, attempt, "transient restart failure, retrying");
                tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
            }
            RestartOutcome::TransientFailure { detail } => {
                return Err(FailureReason::ServiceRestartPermanent(format!(
                    "{service}: still transient after {SERVICE_RETRIES} retries: {detail}"
                )));
            }
            RestartOutcome::UnknownService => {
                return Err(FailureReason::ServiceRestartPermanent(format!(
                    "{service}: unknown to the init system"
                )));
            }
            RestartOutcome::PermanentFailure { detail } => {
                return Err(FailureReason::ServiceRestartPermanent(format!(
                    "{service}: {detail}"
                )));
            }
        }
    }
}

/// Lifts watcher suppression when the revert (including service
/// restarts) is done, success or failure.
struct SuppressGuard {
    suppress: Arc<Mutex<HashSet<PathBuf>>>,
    paths: Vec<PathBuf>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        let mut suppress = self.suppress.lock();
        for path in &self.paths {
            suppress.remove(path);
        }
    }
}

#[cfg(test)]
#[path = "revert_tests.rs"]
mod tests;
