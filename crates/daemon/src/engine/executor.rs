// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect execution.
//!
//! Timers mutate the scheduler inline; everything with I/O is spawned
//! onto a worker and reports back through the event bus.

use crate::engine::{revert, Runtime};
use chrono::{TimeZone, Utc};
use rvt_core::{AcceptedPath, Clock, Effect, Event, SnapshotOrigin};
use rvt_snapstore::SnapshotStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, warn};

impl<C: Clock + 'static> Runtime<C> {
    pub async fn execute(&self, effect: Effect) {
        match effect {
            Effect::Emit { event } => self.send(event),

            Effect::SetTimer { change_id, kind, duration } => {
                self.scheduler.lock().schedule(change_id, kind, duration, self.clock.now());
            }

            Effect::CancelTimer { change_id, kind } => {
                self.scheduler.lock().cancel(&change_id, kind);
            }

            Effect::CapturePreChange { category, trigger_path, trigger_digest, scope } => {
                let store = Arc::clone(&self.store);
                let bus = self.bus.clone();
                let wall_ms = self.clock.epoch_ms();
                let mono_ms = self.started_at.elapsed().as_millis() as u64;
                let system_tool = self
                    .config
                    .read()
                    .snapshot_enable_system_tool
                    .then(|| self.system_tool.clone())
                    .flatten();

                tokio::spawn(async move {
                    let result = {
                        let store = Arc::clone(&store);
                        let category = category.clone();
                        tokio::task::spawn_blocking(move || {
                            assemble_pre_change(&store, &scope, &category, wall_ms, mono_ms)
                        })
                        .await
                    };

                    let event = match result {
                        Ok(Ok(manifest)) => {
                            if let Some(tool) = system_tool {
                                if let Some(system_id) =
                                    tool.create(&format!("revertit {}", manifest.id)).await
                                {
                                    let _ = store.attach_system_snapshot(&manifest.id, system_id);
                                }
                            }
                            Event::SnapshotCaptured {
                                category,
                                snapshot_id: manifest.id,
                                trigger_path,
                                trigger_digest,
                                at_ms: wall_ms,
                            }
                        }
                        Ok(Err(e)) => Event::SnapshotCaptureFailed {
                            category,
                            trigger_path,
                            error: e.to_string(),
                            at_ms: wall_ms,
                        },
                        Err(join) => Event::SnapshotCaptureFailed {
                            category,
                            trigger_path,
                            error: format!("capture worker died: {join}"),
                            at_ms: wall_ms,
                        },
                    };
                    if let Err(e) = bus.send(event) {
                        error!(error = %e, "cannot journal capture result");
                    }
                });
            }

            Effect::CaptureBaseline { paths, description } => {
                let store = Arc::clone(&self.store);
                let bus = self.bus.clone();
                let wall_ms = self.clock.epoch_ms();
                let mono_ms = self.started_at.elapsed().as_millis() as u64;

                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(move || {
                        let manifest = store.capture(
                            &paths,
                            SnapshotOrigin::Auto,
                            Some(description),
                            ms_to_utc(wall_ms),
                            mono_ms,
                        )?;
                        let removed = store.tombstones(&manifest.id)?;
                        Ok::<_, rvt_snapstore::SnapshotError>((manifest, removed))
                    })
                    .await;

                    match result {
                        Ok(Ok((manifest, removed))) => {
                            let accepted = manifest
                                .entries
                                .iter()
                                .map(|e| AcceptedPath {
                                    path: e.path.clone(),
                                    digest: e.digest.clone(),
                                })
                                .collect();
                            let event = Event::BaselineAccepted {
                                snapshot_id: manifest.id.clone(),
                                accepted,
                                removed,
                                at_ms: wall_ms,
                            };
                            if let Err(e) = bus.send(event) {
                                error!(error = %e, "cannot journal baseline");
                            }
                        }
                        Ok(Err(e)) => warn!(error = %e, "baseline capture failed"),
                        Err(join) => warn!(error = %join, "baseline worker died"),
                    }
                });
            }

            Effect::RunProbe { change_id, endpoints, budget } => {
                let bus = self.bus.clone();
                let wall_ms_base = self.clock.epoch_ms();
                tokio::spawn(async move {
                    let report = tokio::time::timeout(
                        budget,
                        rvt_probe::reachable(&endpoints, budget),
                    )
                    .await
                    .unwrap_or_else(|_| rvt_probe::ReachReport {
                        reachable: false,
                        endpoints: vec![],
                    });

                    let event = Event::ProbeObserved {
                        change_id,
                        reachable: report.reachable,
                        endpoints: report.endpoints,
                        at_ms: wall_ms_base,
                    };
                    if let Err(e) = bus.send(event) {
                        error!(error = %e, "cannot journal probe result");
                    }
                });
            }

            Effect::ExecuteRevert { change_id, snapshot_id, paths, services } => {
                let ctx = revert::RevertCtx {
                    store: Arc::clone(&self.store),
                    bus: self.bus.clone(),
                    suppress: Arc::clone(&self.suppress),
                    service_control: self.probe.service_control.clone(),
                    wall_ms: self.clock.epoch_ms(),
                };
                let task =
                    tokio::spawn(revert::run(ctx, change_id, snapshot_id, paths, services));
                let mut tasks = self.revert_tasks.lock();
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
        }
    }
}

/// Decide per path where its pre-change content comes from, then build
/// the snapshot.
fn assemble_pre_change(
    store: &SnapshotStore,
    scope: &[(PathBuf, Option<(rvt_core::SnapshotId, rvt_core::ContentDigest)>)],
    category: &rvt_core::Category,
    wall_ms: u64,
    mono_ms: u64,
) -> Result<rvt_snapstore::Manifest, rvt_snapstore::SnapshotError> {
    let mut from_disk = Vec::new();
    let mut copy_from = Vec::new();
    let mut absent = Vec::new();

    for (path, baseline) in scope {
        let disk_digest = match std::fs::read(path) {
            Ok(bytes) => Some(rvt_core::digest_bytes(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match (baseline, disk_digest) {
            // Disk still holds the accepted content: read it fresh
            (Some((_, accepted)), Some(ref on_disk)) if accepted == on_disk => {
                from_disk.push(path.clone())
            }
            // Disk has moved on (the edit we are snapshotting around):
            // the accepted bytes live in the baseline snapshot
            (Some((snapshot, _)), _) => copy_from.push((snapshot.clone(), path.clone())),
            // Never accepted: pre-change state is "absent"
            (None, _) => absent.push(path.clone()),
        }
    }

    store.assemble(
        &from_disk,
        &copy_from,
        &absent,
        SnapshotOrigin::Auto,
        Some(format!("pre-change {category}")),
        ms_to_utc(wall_ms),
        mono_ms,
    )
}

pub(crate) fn ms_to_utc(ms: u64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64).single().unwrap_or_else(Utc::now)
}
