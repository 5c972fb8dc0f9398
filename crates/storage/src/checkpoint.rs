// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint persistence for crash recovery.
//!
//! A checkpoint stores the complete [`LedgerState`] at a journal
//! sequence number. Recovery loads the checkpoint and replays journal
//! entries after that sequence.

use crate::state::LedgerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Current checkpoint schema version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Errors from checkpoint operations.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported checkpoint version {0}")]
    Version(u32),
}

/// The ledger state at a point in the journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "v")]
    pub version: u32,
    /// Journal sequence covered by this checkpoint.
    pub seq: u64,
    pub state: LedgerState,
    pub created_at: DateTime<Utc>,
}

/// Load the checkpoint if one exists.
pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(CheckpointError::Version(checkpoint.version));
    }
    Ok(Some(checkpoint))
}

/// Write a checkpoint atomically, rotating the previous one to `.bak`.
pub fn write_checkpoint(
    path: &Path,
    state: &LedgerState,
    seq: u64,
) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let checkpoint = Checkpoint {
        version: CHECKPOINT_VERSION,
        seq,
        state: state.clone(),
        created_at: Utc::now(),
    };

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&serde_json::to_vec(&checkpoint)?)?;
        file.sync_all()?;
    }

    if path.exists() {
        let bak = crate::journal::rotate_bak_path(path);
        let _ = fs::rename(path, bak);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
