// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the runtime needs to perform.
//!
//! Handlers compute effects; the executor runs them. Effects with I/O
//! run on worker tasks and deliver completions back as events, so the
//! ledger owner task never blocks.

use crate::category::Category;
use crate::event::Event;
use crate::id::{ChangeId, SnapshotId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which of a change's two windows a timer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Deadline,
    Grace,
}

crate::simple_display! {
    TimerKind {
        Deadline => "deadline",
        Grace => "grace",
    }
}

/// Effects that need to be executed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit a follow-up event into the ledger queue
    Emit { event: Event },

    /// Arm a monotonic timer for a change window
    SetTimer {
        change_id: ChangeId,
        kind: TimerKind,
        #[serde(with = "duration_secs")]
        duration: Duration,
    },

    /// Disarm a timer (confirm/cancel races)
    CancelTimer { change_id: ChangeId, kind: TimerKind },

    /// Assemble the pre-change snapshot for a category on a worker.
    /// Paths whose on-disk content still matches their baseline are read
    /// from disk; already-edited paths are copied out of their baseline
    /// snapshot; paths with no baseline are tombstoned (their pre-change
    /// state is "absent").
    CapturePreChange {
        category: Category,
        trigger_path: PathBuf,
        trigger_digest: Option<crate::digest::ContentDigest>,
        /// Scope with each path's baseline source, resolved under the
        /// state lock; the worker compares disk digests and assembles.
        scope: Vec<(PathBuf, Option<(SnapshotId, crate::digest::ContentDigest)>)>,
    },

    /// Capture the current (accepted) content of paths as a new baseline
    CaptureBaseline { paths: Vec<PathBuf>, description: String },

    /// Run a reachability probe on a worker; total budget is half the
    /// grace period so the result lands before `grace:fired`
    RunProbe {
        change_id: ChangeId,
        endpoints: Vec<String>,
        #[serde(with = "duration_secs")]
        budget: Duration,
    },

    /// Execute a restore plan then restart services, on a worker
    ExecuteRevert {
        change_id: ChangeId,
        snapshot_id: SnapshotId,
        paths: Vec<PathBuf>,
        services: Vec<String>,
    },
}

/// Serialize durations as whole seconds; sub-second precision is not
/// meaningful for confirmation windows.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_effect_round_trips_in_seconds() {
        let effect = Effect::SetTimer {
            change_id: ChangeId::from_string("ssh_1"),
            kind: TimerKind::Grace,
            duration: Duration::from_secs(30),
        };
        let json = serde_json::to_string(&effect).unwrap();
        let back: Effect = serde_json::from_str(&json).unwrap();
        assert_eq!(back, effect);
    }

    #[test]
    fn timer_kind_display() {
        assert_eq!(TimerKind::Deadline.to_string(), "deadline");
        assert_eq!(TimerKind::Grace.to_string(), "grace");
    }
}
