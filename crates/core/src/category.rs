// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change categories and their revert policies.
//!
//! A category groups watched paths that share a confirmation timeout
//! and a service-restart list. The five builtin categories always
//! exist; configuration may define more.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Builtin category names, in classifier priority order.
pub const BUILTIN_CATEGORIES: [&str; 5] = ["network", "ssh", "firewall", "services", "other"];

/// Name of a change category (e.g. `ssh`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Category {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Category {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Revert policy for one category. Static after load; `reload_policies`
/// swaps the whole [`PolicySet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Confirmation window, fixed when a change opens.
    pub timeout: Duration,
    /// Window after deadline expiry during which a confirm is still honored.
    pub grace_period: Duration,
    /// Whether a reachability probe is launched on entering GRACE.
    pub connectivity_check: bool,
    /// Services restarted, in order, after files are restored.
    pub services: Vec<String>,
    /// Window during which further edits merge into an open change.
    pub coalesce_window: Duration,
}

impl Policy {
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);
    pub const DEFAULT_COALESCE: Duration = Duration::from_secs(10);

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            grace_period: Self::DEFAULT_GRACE,
            connectivity_check: false,
            services: Vec::new(),
            coalesce_window: Self::DEFAULT_COALESCE,
        }
    }
}

/// All category policies, resolved at startup (and on reload).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    policies: HashMap<Category, Policy>,
    /// Fallback for categories without an explicit policy.
    pub default_timeout: Duration,
}

impl PolicySet {
    pub fn new(default_timeout: Duration) -> Self {
        Self { policies: HashMap::new(), default_timeout }
    }

    pub fn insert(&mut self, category: Category, policy: Policy) {
        self.policies.insert(category, policy);
    }

    /// Policy for a category, falling back to the default timeout.
    pub fn for_category(&self, category: &Category) -> Policy {
        self.policies
            .get(category)
            .cloned()
            .unwrap_or_else(|| Policy::with_timeout(self.default_timeout))
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.policies.keys()
    }
}

#[cfg(test)]
#[path = "category_tests.rs"]
mod tests;
