// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service restart primitive.
//!
//! The revert engine needs to distinguish retryable failures (timeouts,
//! busy units) from permanent ones (unknown unit, missing restart
//! command): transient outcomes are retried with backoff, permanent ones
//! mark the change FAILED.

use crate::detect::InitSystem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Outcome of a restart attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum RestartOutcome {
    Ok,
    /// The init system does not know the unit. Not retryable.
    UnknownService,
    /// Timeout or retryable exit code.
    TransientFailure { detail: String },
    /// Restart command missing or unusable. Not retryable.
    PermanentFailure { detail: String },
}

impl RestartOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }
}

/// How the detected init system spells "restart".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartStyle {
    /// `systemctl restart <unit>`
    Systemctl,
    /// `rc-service <name> restart`
    RcService,
    /// `service <name> restart`
    Service,
}

/// Capability object for restarting services, built once by the probe.
#[derive(Debug, Clone)]
pub struct ServiceControl {
    program: PathBuf,
    style: RestartStyle,
    timeout: Duration,
}

impl ServiceControl {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn for_init(init: InitSystem) -> Option<Self> {
        let (program, style) = match init {
            InitSystem::Systemd => ("systemctl", RestartStyle::Systemctl),
            InitSystem::Openrc => ("rc-service", RestartStyle::RcService),
            InitSystem::SysvInit => ("service", RestartStyle::Service),
            InitSystem::Unknown => return None,
        };
        Some(Self {
            program: PathBuf::from(program),
            style,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    /// Override the restart binary (tests point this at a stub).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args<'a>(&self, service: &'a str) -> [&'a str; 2] {
        match self.style {
            RestartStyle::Systemctl => ["restart", service],
            RestartStyle::RcService | RestartStyle::Service => [service, "restart"],
        }
    }

    /// Restart one service, classifying the result.
    pub async fn restart(&self, service: &str) -> RestartOutcome {
        debug!(program = %self.program.display(), service, "restarting service");

        let child = Command::new(&self.program)
            .args(self.args(service))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return RestartOutcome::PermanentFailure {
                    detail: format!("{} not found", self.program.display()),
                };
            }
            Ok(Err(e)) => {
                return RestartOutcome::PermanentFailure { detail: e.to_string() };
            }
            Err(_) => {
                warn!(service, "service restart timed out");
                return RestartOutcome::TransientFailure {
                    detail: format!("timed out after {:?}", self.timeout),
                };
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        classify(self.style, output.status.code(), &stderr)
    }
}

/// Map an exit status and stderr to an outcome.
fn classify(style: RestartStyle, code: Option<i32>, stderr: &str) -> RestartOutcome {
    match code {
        Some(0) => RestartOutcome::Ok,
        // systemctl: 5 = unknown unit
        Some(5) if style == RestartStyle::Systemctl => RestartOutcome::UnknownService,
        Some(code) => {
            let lower = stderr.to_ascii_lowercase();
            if lower.contains("not found") || lower.contains("unrecognized service") {
                RestartOutcome::UnknownService
            } else {
                RestartOutcome::TransientFailure {
                    detail: format!("exit {code}: {}", stderr.trim()),
                }
            }
        }
        // Killed by signal
        None => RestartOutcome::TransientFailure { detail: "terminated by signal".into() },
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
