// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore plans.
//!
//! A plan describes the file writes, attribute fixups, and deletions
//! that bring the filesystem back to a snapshot's state. The store only
//! builds plans; the revert engine executes them. Steps are keyed by
//! content digest, so re-running a partially executed plan converges.

use rvt_core::{ContentDigest, SnapshotId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One step of a restore plan, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum RestoreStep {
    /// Write the blob's payload over `path` (temp + fsync + rename),
    /// then restore mode and ownership.
    WriteFile {
        path: PathBuf,
        blob: PathBuf,
        digest: ContentDigest,
        mode: u32,
        uid: u32,
        gid: u32,
    },
    /// The path did not exist at capture; remove it.
    RemoveFile { path: PathBuf },
}

impl RestoreStep {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::WriteFile { path, .. } | Self::RemoveFile { path } => path,
        }
    }
}

/// Ordered restore work for one snapshot, scoped to the requested paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorePlan {
    pub snapshot_id: SnapshotId,
    pub steps: Vec<RestoreStep>,
}

impl RestorePlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Paths the plan touches (the watcher suppresses events on these
    /// for the plan's duration).
    pub fn touched_paths(&self) -> Vec<PathBuf> {
        self.steps.iter().map(|s| s.path().clone()).collect()
    }
}
