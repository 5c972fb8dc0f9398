// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rvt-snapstore: Snapshot archive for watched configuration files.
//!
//! Each snapshot is one directory under the store root:
//!
//! ```text
//! <root>/<snapshot_id>/
//!   manifest.json      # written last, temp+rename
//!   tombstones.json    # paths that did not exist at capture
//!   blobs/<digest>     # zstd-compressed payloads, named by content digest
//! ```
//!
//! A directory without a manifest is an interrupted capture; the startup
//! sweeper removes it. Blob I/O is synchronous: callers run captures
//! and verifies on worker tasks.

pub mod manifest;
pub mod plan;
pub mod store;
pub mod timeshift;

use thiserror::Error;

pub use manifest::{Manifest, SnapshotEntry};
pub use plan::{RestorePlan, RestoreStep};
pub use store::{read_blob_file, SnapshotStore, VerifyOutcome};
pub use timeshift::SystemSnapshotTool;

/// Errors from snapshot store operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot not found: {0}")]
    NotFound(rvt_core::SnapshotId),

    #[error("Snapshot {id} is corrupt: {} entries failed verification", entries.len())]
    Corrupt { id: rvt_core::SnapshotId, entries: Vec<std::path::PathBuf> },
}
