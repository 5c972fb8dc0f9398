// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier types for changes and snapshots.

use crate::category::Category;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one pending change: `<category>_<seq>` (e.g. `ssh_3`).
///
/// The sequence is per-category and allocated by the ledger, so ids are
/// short enough to type into `revertit confirm` from a phone over a
/// flaky SSH session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    pub fn new(category: &Category, seq: u64) -> Self {
        Self(format!("{category}_{seq}"))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category portion of the id, `None` if the id is malformed.
    pub fn category(&self) -> Option<Category> {
        self.0.rsplit_once('_').map(|(cat, _)| Category::new(cat))
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChangeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ChangeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ChangeId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for ChangeId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

/// Identifier of one snapshot: `<epoch_ms>-<suffix>`.
///
/// The millisecond prefix is zero-padded so lexicographic directory
/// order matches creation order; the nanoid suffix disambiguates
/// captures within the same millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    const SUFFIX_LEN: usize = 6;

    pub fn generate(epoch_ms: u64) -> Self {
        Self(format!("{epoch_ms:013}-{}", nanoid::nanoid!(6)))
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SnapshotId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// How a snapshot came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Captured by the ledger when a change opened. Evictable by retention.
    Auto,
    /// Requested by an operator. Never auto-evicted.
    Manual,
}

crate::simple_display! {
    SnapshotOrigin {
        Auto => "auto",
        Manual => "manual",
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
