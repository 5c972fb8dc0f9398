// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional whole-system snapshot integration.
//!
//! When a system snapshot tool is installed and enabled, the store asks
//! it for a full snapshot alongside the per-file capture. The returned
//! id is recorded in the manifest for operator awareness only: restore
//! always works from the file-level entries.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{info, warn};

/// Capability object for the system snapshot tool (timeshift).
#[derive(Debug, Clone)]
pub struct SystemSnapshotTool {
    program: PathBuf,
    timeout: Duration,
}

impl SystemSnapshotTool {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Detect the tool; `None` when not installed.
    pub fn detect() -> Option<Self> {
        ["/usr/bin/timeshift", "/usr/sbin/timeshift"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .map(|program| Self { program, timeout: Self::DEFAULT_TIMEOUT })
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), timeout: Self::DEFAULT_TIMEOUT }
    }

    /// Request a system snapshot; returns the tool's snapshot id (its
    /// stdout-reported name, falling back to the comment we passed).
    pub async fn create(&self, comment: &str) -> Option<String> {
        let run = tokio::process::Command::new(&self.program)
            .args(["--create", "--comments", comment, "--scripted"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                warn!(status = ?output.status.code(), "system snapshot tool failed");
                return None;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "system snapshot tool could not run");
                return None;
            }
            Err(_) => {
                warn!("system snapshot tool timed out");
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout
            .lines()
            .find_map(|l| l.strip_prefix("Tagged snapshot '").map(|r| r.trim_end_matches("':")))
            .map(|s| s.trim_matches('\'').to_string())
            .unwrap_or_else(|| comment.to_string());

        info!(%id, "system snapshot recorded");
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[tokio::test]
    async fn missing_tool_returns_none() {
        let tool = SystemSnapshotTool::with_program("/nonexistent/timeshift");
        assert!(tool.create("pre-change").await.is_none());
    }

    #[tokio::test]
    async fn stub_tool_yields_reported_tag() {
        let dir = tempfile::TempDir::new().unwrap();
        let stub = dir.path().join("timeshift");
        std::fs::write(&stub, "#!/bin/sh\necho \"Tagged snapshot '2026-08-01_00-00-01':\"\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let tool = SystemSnapshotTool::with_program(&stub);
        assert_eq!(tool.create("pre-change").await.as_deref(), Some("2026-08-01_00-00-01"));
    }
}
