// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot manifests.

use chrono::{DateTime, Utc};
use rvt_core::{ContentDigest, SnapshotId, SnapshotOrigin};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One captured file. `blob` is the digest-named payload filename under
/// the snapshot's `blobs/` directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: PathBuf,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub digest: ContentDigest,
    pub blob: String,
}

/// Snapshot metadata. Presence of a manifest implies every referenced
/// blob was fully written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: SnapshotId,
    pub created_at_wall: DateTime<Utc>,
    /// Monotonic milliseconds since daemon start, for ordering captures
    /// across wall-clock steps.
    pub created_at_mono: u64,
    pub origin: SnapshotOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entries: Vec<SnapshotEntry>,
    /// Id reported by the whole-system snapshot tool, when one ran.
    /// Recorded for operator awareness; file entries stay the source of
    /// truth for restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_snapshot_id: Option<String>,
}

impl Manifest {
    pub fn entry_for(&self, path: &std::path::Path) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvt_core::digest_bytes;

    #[test]
    fn manifest_round_trips() {
        let digest = digest_bytes(b"payload");
        let manifest = Manifest {
            id: SnapshotId::from_string("0000000001000-abcdef"),
            created_at_wall: Utc::now(),
            created_at_mono: 12_345,
            origin: SnapshotOrigin::Auto,
            description: None,
            entries: vec![SnapshotEntry {
                path: PathBuf::from("/etc/ssh/sshd_config"),
                mode: 0o644,
                uid: 0,
                gid: 0,
                size: 7,
                digest: digest.clone(),
                blob: digest.as_str().to_string(),
            }],
            system_snapshot_id: None,
        };

        let json = serde_json::to_string(&manifest).unwrap();
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
        assert!(back.entry_for(std::path::Path::new("/etc/ssh/sshd_config")).is_some());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let manifest = Manifest {
            id: SnapshotId::from_string("0000000001000-abcdef"),
            created_at_wall: Utc::now(),
            created_at_mono: 0,
            origin: SnapshotOrigin::Manual,
            description: None,
            entries: vec![],
            system_snapshot_id: None,
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(!json.contains("description"));
        assert!(!json.contains("system_snapshot_id"));
    }
}
