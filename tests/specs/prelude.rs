// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the end-to-end specs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Generous ceiling for wait_for polls (CI boxes are slow).
pub const SPEC_WAIT_MAX_MS: u64 = 15_000;

/// One isolated daemon instance in a temp directory.
pub struct Host {
    temp: TempDir,
    daemon: Option<Child>,
}

pub struct CommandResult {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn passes(self) -> Self {
        assert_eq!(self.code, 0, "expected success, got {}:\n{}\n{}", self.code, self.stdout, self.stderr);
        self
    }

    pub fn exits(self, code: i32) -> Self {
        assert_eq!(self.code, code, "expected exit {code}, got {}:\n{}\n{}", self.code, self.stdout, self.stderr);
        self
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout missing {needle:?}:\n{}", self.stdout);
        self
    }
}

impl Host {
    /// Create the layout and write a config with the given category
    /// policies: `(name, glob, timeout_secs, grace_secs)`.
    pub fn new(categories: &[(&str, &str, u64, u64)]) -> Self {
        let temp = TempDir::new().expect("tempdir");
        std::fs::create_dir_all(temp.path().join("etc/ssh")).expect("etc");
        std::fs::create_dir_all(temp.path().join("etc/systemd")).expect("etc");
        std::fs::create_dir_all(temp.path().join("state")).expect("state");

        let mut config = String::from(
            "[global]\ndefault_timeout = 60\nmax_timeout = 1800\n\n[snapshot]\nmax_snapshots = 50\nmax_age_days = 30\n\n[monitoring]\n",
        );
        for (name, glob, _, _) in categories {
            let glob = glob.replace("{etc}", &temp.path().join("etc").display().to_string());
            config.push_str(&format!("{name} = [\"{glob}\"]\n"));
        }
        config.push_str("\n[timeout]\ntimeout_action = \"revert\"\n");
        for (name, _, timeout, grace) in categories {
            config.push_str(&format!(
                "\n[categories.{name}]\ntimeout = {timeout}\ngrace_period = {grace}\n"
            ));
        }
        std::fs::write(temp.path().join("config.toml"), config).expect("config");

        Self { temp, daemon: None }
    }

    pub fn etc(&self) -> PathBuf {
        self.temp.path().join("etc")
    }

    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.etc().join(rel);
        std::fs::write(&path, content).expect("write file");
        path
    }

    pub fn read(&self, path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    fn socket(&self) -> PathBuf {
        self.temp.path().join("control.sock")
    }

    fn apply_env(&self, cmd: &mut Command) {
        cmd.env("REVERTIT_SOCKET", self.socket())
            .env("REVERTIT_STATE_DIR", self.temp.path().join("state"))
            .env("REVERTIT_CONFIG", self.temp.path().join("config.toml"))
            .env("REVERTIT_LOG_STDERR", "1")
            .env("REVERTIT_LOG", "info")
            .env("REVERTIT_TIMER_CHECK_MS", "50")
            .env("REVERTIT_DEBOUNCE_MS", "50")
            .env("REVERTIT_HOUSEKEEPING_MS", "500");
    }

    /// Start the daemon and wait until the CLI can reach it.
    pub fn start(&mut self) {
        assert!(self.daemon.is_none(), "daemon already running");
        let mut cmd = Command::new(bin("revertitd"));
        self.apply_env(&mut cmd);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        let child = cmd.spawn().expect("spawn revertitd");
        self.daemon = Some(child);

        let up = wait_for(SPEC_WAIT_MAX_MS, || self.revertit(&["status"]).code == 0);
        assert!(up, "daemon did not come up");
        // Let the watcher arm and the startup baseline land
        std::thread::sleep(Duration::from_millis(300));
    }

    /// Kill the daemon hard (simulates a crash).
    pub fn kill(&mut self) {
        if let Some(mut child) = self.daemon.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    /// Run a daemon to completion in the foreground (lock-conflict specs).
    pub fn run_daemon_foreground(&self) -> CommandResult {
        let mut cmd = Command::new(bin("revertitd"));
        self.apply_env(&mut cmd);
        let output = cmd.output().expect("run revertitd");
        CommandResult {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Run one CLI command to completion.
    pub fn revertit(&self, args: &[&str]) -> CommandResult {
        let mut cmd = Command::new(bin("revertit"));
        self.apply_env(&mut cmd);
        let output = cmd.args(args).output().expect("run revertit");
        CommandResult {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Wait until `timeouts` lists the given change id.
    pub fn wait_for_change(&self, change_id: &str) {
        let seen = wait_for(SPEC_WAIT_MAX_MS, || {
            self.revertit(&["timeouts"]).stdout.contains(change_id)
        });
        assert!(seen, "change {change_id} never appeared");
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.kill();
    }
}

fn bin(name: &str) -> PathBuf {
    assert_cmd::cargo::cargo_bin(name)
}

/// Poll `check` until it passes or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    loop {
        if check() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
