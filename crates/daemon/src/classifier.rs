// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path classification.
//!
//! Compiles the configured globs once per category into an ordered match
//! list; the first matching category wins. Rebuilt on configuration
//! reload. Paths that classify to nothing are not tracked.

use glob::{MatchOptions, Pattern};
use rvt_core::Category;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One compiled category: globs plus the literal paths they expand to
/// right now.
struct CategoryMatcher {
    category: Category,
    patterns: Vec<Pattern>,
}

/// Ordered glob matcher from configuration.
pub struct Classifier {
    matchers: Vec<CategoryMatcher>,
}

impl Classifier {
    /// Compile the monitoring table. Unparseable globs are skipped with
    /// a warning rather than taking the daemon down.
    pub fn compile(monitoring: &[(Category, Vec<String>)]) -> Self {
        let mut matchers = Vec::with_capacity(monitoring.len());
        for (category, globs) in monitoring {
            let mut patterns = Vec::with_capacity(globs.len());
            for text in globs {
                match Pattern::new(text) {
                    Ok(pattern) => patterns.push(pattern),
                    Err(e) => {
                        warn!(category = %category, glob = %text, error = %e, "bad glob, skipped")
                    }
                }
            }
            matchers.push(CategoryMatcher { category: category.clone(), patterns });
        }
        Self { matchers }
    }

    /// First matching category, or `None` for untracked paths.
    pub fn classify(&self, path: &Path) -> Option<&Category> {
        // Match path separators literally so `/etc/*.conf` cannot match
        // files in subdirectories
        let options = MatchOptions { require_literal_separator: true, ..Default::default() };
        self.matchers.iter().find_map(|m| {
            m.patterns
                .iter()
                .any(|p| p.matches_path_with(path, options))
                .then_some(&m.category)
        })
    }

    /// Paths currently on disk that match any pattern, per category.
    /// Used for snapshot scopes and watcher arming.
    pub fn expand(&self) -> Vec<(Category, Vec<PathBuf>)> {
        self.matchers
            .iter()
            .map(|m| {
                let mut paths: Vec<PathBuf> = Vec::new();
                for pattern in &m.patterns {
                    match glob::glob(pattern.as_str()) {
                        Ok(hits) => paths.extend(hits.flatten().filter(|p| p.is_file())),
                        Err(e) => warn!(glob = %pattern, error = %e, "glob expansion failed"),
                    }
                }
                paths.sort();
                paths.dedup();
                (m.category.clone(), paths)
            })
            .collect()
    }

    /// Expanded paths for one category.
    pub fn expand_category(&self, category: &Category) -> Vec<PathBuf> {
        self.expand()
            .into_iter()
            .find(|(c, _)| c == category)
            .map(|(_, paths)| paths)
            .unwrap_or_default()
    }

    /// Directories the watcher must monitor: parents of every pattern
    /// (literal files may be replaced via rename, and globbed entries
    /// may appear later).
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        for matcher in &self.matchers {
            for pattern in &matcher.patterns {
                let text = pattern.as_str();
                // Deepest prefix without glob metacharacters
                let cut = text.find(['*', '?', '[']).unwrap_or(text.len());
                let literal = &text[..cut];
                let parent = match literal.rfind('/') {
                    Some(0) => PathBuf::from("/"),
                    Some(idx) => PathBuf::from(&literal[..idx]),
                    None => continue,
                };
                roots.push(parent);
            }
        }
        roots.sort();
        roots.dedup();
        // Drop roots nested under another root
        let mut kept: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !kept.iter().any(|k| root.starts_with(k)) {
                kept.push(root);
            }
        }
        kept
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
