// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The snapshot store.

use crate::manifest::{Manifest, SnapshotEntry};
use crate::plan::{RestorePlan, RestoreStep};
use crate::SnapshotError;
use chrono::{DateTime, Utc};
use rvt_core::{digest_bytes, SnapshotId, SnapshotOrigin};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const TOMBSTONES_FILE: &str = "tombstones.json";
const BLOBS_DIR: &str = "blobs";

/// Result of an integrity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerifyOutcome {
    Ok,
    /// Paths whose recomputed digest differs or whose blob is unreadable.
    Corrupt(Vec<PathBuf>),
}

/// Content-addressed-by-path-and-time archive of prior file states.
///
/// The store owns all payload I/O under its root; other components hold
/// snapshot ids and request plans.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// Open (creating the root if needed).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Capture the current bytes of `paths`. Paths that do not exist are
    /// recorded as tombstones. The manifest is written last; a crash
    /// beforehand leaves an orphan directory for [`Self::sweep_incomplete`].
    pub fn capture(
        &self,
        paths: &[PathBuf],
        origin: SnapshotOrigin,
        description: Option<String>,
        wall: DateTime<Utc>,
        mono_ms: u64,
    ) -> Result<Manifest, SnapshotError> {
        let id = SnapshotId::generate(wall.timestamp_millis().max(0) as u64);
        let dir = self.dir(&id);
        let blobs = dir.join(BLOBS_DIR);
        fs::create_dir_all(&blobs)?;

        let mut entries = Vec::new();
        let mut tombstones = Vec::new();

        for path in paths {
            let meta = match fs::symlink_metadata(path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => {
                    // Directories and symlinks are not snapshot material
                    debug!(path = %path.display(), "skipping non-regular file");
                    continue;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tombstones.push(path.clone());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let bytes = fs::read(path)?;
            let digest = digest_bytes(&bytes);
            let blob_path = blobs.join(digest.as_str());
            // Identical content within one capture shares a blob
            if !blob_path.exists() {
                write_compressed(&blob_path, &bytes)?;
            }

            entries.push(SnapshotEntry {
                path: path.clone(),
                mode: meta.mode() & 0o7777,
                uid: meta.uid(),
                gid: meta.gid(),
                size: meta.len(),
                digest,
                blob: blob_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            });
        }

        write_json_atomic(&dir.join(TOMBSTONES_FILE), &tombstones)?;

        let manifest = Manifest {
            id: id.clone(),
            created_at_wall: wall,
            created_at_mono: mono_ms,
            origin,
            description,
            entries,
            system_snapshot_id: None,
        };
        write_json_atomic(&dir.join(MANIFEST_FILE), &manifest)?;

        info!(
            snapshot = %id,
            files = manifest.entries.len(),
            tombstones = tombstones.len(),
            %origin,
            "snapshot captured"
        );
        Ok(manifest)
    }

    /// Assemble a pre-change snapshot from mixed sources: `from_disk`
    /// paths are read as in [`Self::capture`]; `copy_from` entries are
    /// carried over blob-and-attributes from an earlier snapshot (the
    /// path's accepted baseline, which current disk content no longer
    /// matches); `absent` paths are tombstoned.
    pub fn assemble(
        &self,
        from_disk: &[PathBuf],
        copy_from: &[(SnapshotId, PathBuf)],
        absent: &[PathBuf],
        origin: SnapshotOrigin,
        description: Option<String>,
        wall: DateTime<Utc>,
        mono_ms: u64,
    ) -> Result<Manifest, SnapshotError> {
        let id = SnapshotId::generate(wall.timestamp_millis().max(0) as u64);
        let dir = self.dir(&id);
        let blobs = dir.join(BLOBS_DIR);
        fs::create_dir_all(&blobs)?;

        let mut entries = Vec::new();
        let mut tombstones: Vec<PathBuf> = absent.to_vec();

        for path in from_disk {
            match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_file() => {
                    let bytes = fs::read(path)?;
                    let digest = digest_bytes(&bytes);
                    let blob_path = blobs.join(digest.as_str());
                    if !blob_path.exists() {
                        write_compressed(&blob_path, &bytes)?;
                    }
                    entries.push(SnapshotEntry {
                        path: path.clone(),
                        mode: meta.mode() & 0o7777,
                        uid: meta.uid(),
                        gid: meta.gid(),
                        size: meta.len(),
                        digest,
                        blob: blob_path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    });
                }
                Ok(_) => debug!(path = %path.display(), "skipping non-regular file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tombstones.push(path.clone())
                }
                Err(e) => return Err(e.into()),
            }
        }

        for (source_id, path) in copy_from {
            let source = self.load(source_id)?;
            let Some(entry) = source.entry_for(path) else {
                // No accepted content in the source: pre-change state is absent
                tombstones.push(path.clone());
                continue;
            };
            let target = blobs.join(&entry.blob);
            if !target.exists() {
                fs::copy(self.dir(source_id).join(BLOBS_DIR).join(&entry.blob), &target)?;
            }
            entries.push(entry.clone());
        }

        write_json_atomic(&dir.join(TOMBSTONES_FILE), &tombstones)?;

        let manifest = Manifest {
            id: id.clone(),
            created_at_wall: wall,
            created_at_mono: mono_ms,
            origin,
            description,
            entries,
            system_snapshot_id: None,
        };
        write_json_atomic(&dir.join(MANIFEST_FILE), &manifest)?;

        info!(
            snapshot = %id,
            files = manifest.entries.len(),
            copied = copy_from.len(),
            tombstones = tombstones.len(),
            "pre-change snapshot assembled"
        );
        Ok(manifest)
    }

    /// Record the id returned by the whole-system snapshot tool.
    pub fn attach_system_snapshot(
        &self,
        id: &SnapshotId,
        system_id: String,
    ) -> Result<(), SnapshotError> {
        let mut manifest = self.load(id)?;
        manifest.system_snapshot_id = Some(system_id);
        write_json_atomic(&self.dir(id).join(MANIFEST_FILE), &manifest)
    }

    /// Load one manifest.
    pub fn load(&self, id: &SnapshotId) -> Result<Manifest, SnapshotError> {
        let path = self.dir(id).join(MANIFEST_FILE);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Tombstoned paths of one snapshot.
    pub fn tombstones(&self, id: &SnapshotId) -> Result<Vec<PathBuf>, SnapshotError> {
        let path = self.dir(id).join(TOMBSTONES_FILE);
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// All manifests, newest first. Ids sort chronologically, so this is
    /// a name sort. Unreadable manifests are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Manifest>, SnapshotError> {
        let mut ids: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        ids.reverse();

        let mut manifests = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&SnapshotId::from_string(id.as_str())) {
                Ok(m) => manifests.push(m),
                Err(SnapshotError::NotFound(_)) => {} // interrupted capture
                Err(e) => warn!(snapshot = %id, error = %e, "unreadable manifest"),
            }
        }
        Ok(manifests)
    }

    /// Read and decompress one payload, without verifying.
    pub fn read_blob(&self, id: &SnapshotId, blob: &str) -> Result<Vec<u8>, SnapshotError> {
        let path = self.dir(id).join(BLOBS_DIR).join(blob);
        let compressed = fs::read(path)?;
        Ok(zstd::decode_all(&compressed[..])?)
    }

    /// Recompute every entry's digest against its payload.
    pub fn verify(&self, id: &SnapshotId) -> Result<VerifyOutcome, SnapshotError> {
        let manifest = self.load(id)?;
        let mut corrupt = Vec::new();
        for entry in &manifest.entries {
            match self.read_blob(id, &entry.blob) {
                Ok(bytes) if digest_bytes(&bytes) == entry.digest => {}
                Ok(_) | Err(SnapshotError::Io(_)) => corrupt.push(entry.path.clone()),
                Err(e) => return Err(e),
            }
        }
        if corrupt.is_empty() {
            Ok(VerifyOutcome::Ok)
        } else {
            Ok(VerifyOutcome::Corrupt(corrupt))
        }
    }

    /// Build the ordered restore plan for a snapshot, scoped to `paths`
    /// when given. Verifies the covered entries first: a corrupt
    /// snapshot must fail the change rather than write bad payloads.
    pub fn restore_plan(
        &self,
        id: &SnapshotId,
        paths: Option<&[PathBuf]>,
    ) -> Result<RestorePlan, SnapshotError> {
        let manifest = self.load(id)?;
        let in_scope = |p: &PathBuf| paths.is_none_or(|s| s.contains(p));

        let mut corrupt = Vec::new();
        let mut steps = Vec::new();
        for entry in manifest.entries.iter().filter(|e| in_scope(&e.path)) {
            match self.read_blob(id, &entry.blob) {
                Ok(bytes) if digest_bytes(&bytes) == entry.digest => {}
                _ => {
                    corrupt.push(entry.path.clone());
                    continue;
                }
            }
            steps.push(RestoreStep::WriteFile {
                path: entry.path.clone(),
                blob: self.dir(id).join(BLOBS_DIR).join(&entry.blob),
                digest: entry.digest.clone(),
                mode: entry.mode,
                uid: entry.uid,
                gid: entry.gid,
            });
        }
        if !corrupt.is_empty() {
            return Err(SnapshotError::Corrupt { id: id.clone(), entries: corrupt });
        }

        for path in self.tombstones(id)?.into_iter().filter(|p| in_scope(p)) {
            steps.push(RestoreStep::RemoveFile { path });
        }

        Ok(RestorePlan { snapshot_id: id.clone(), steps })
    }

    /// Evict auto-origin snapshots beyond the count and age limits.
    /// Manual snapshots are never auto-evicted, and `protected` ids
    /// (active baselines and snapshots backing in-flight changes) are
    /// always kept. Returns evicted ids.
    pub fn retain(
        &self,
        max_snapshots: usize,
        max_age: Duration,
        now: DateTime<Utc>,
        protected: &std::collections::HashSet<SnapshotId>,
    ) -> Result<Vec<SnapshotId>, SnapshotError> {
        let manifests = self.list()?; // newest first
        let mut evicted = Vec::new();

        let mut auto_seen = 0usize;
        for manifest in &manifests {
            if manifest.origin == SnapshotOrigin::Manual || protected.contains(&manifest.id) {
                continue;
            }
            auto_seen += 1;
            let age = now.signed_duration_since(manifest.created_at_wall);
            let too_old = age.num_seconds() >= 0 && age.to_std().is_ok_and(|a| a > max_age);
            if auto_seen > max_snapshots || too_old {
                self.remove(&manifest.id)?;
                evicted.push(manifest.id.clone());
            }
        }

        if !evicted.is_empty() {
            info!(count = evicted.len(), "retention evicted snapshots");
        }
        Ok(evicted)
    }

    /// Remove one snapshot directory entirely.
    pub fn remove(&self, id: &SnapshotId) -> Result<(), SnapshotError> {
        fs::remove_dir_all(self.dir(id))?;
        Ok(())
    }

    /// Remove directories left by captures that crashed before their
    /// manifest rename. Called once at startup.
    pub fn sweep_incomplete(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let mut swept = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let dir = entry.path();
            if !dir.join(MANIFEST_FILE).exists() {
                warn!(dir = %dir.display(), "sweeping incomplete snapshot");
                fs::remove_dir_all(&dir)?;
                swept.push(dir);
            }
        }
        Ok(swept)
    }
}

/// Read and decompress a blob by its absolute path (restore plans carry
/// absolute blob paths so the executor needs no store handle).
pub fn read_blob_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let compressed = fs::read(path)?;
    zstd::decode_all(&compressed[..])
}

/// zstd-compress `bytes` into `path`.
fn write_compressed(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let compressed = zstd::encode_all(bytes, 0)?;
    let mut file = File::create(path)?;
    file.write_all(&compressed)?;
    file.sync_all()?;
    Ok(())
}

/// Serialize to a sibling temp file, fsync, rename into place.
fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(value)?)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
