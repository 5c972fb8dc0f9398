// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability self-test backing `revertit test`.
//!
//! Each check is pass/fail with a human-readable detail; required
//! failures make the overall report (and the CLI exit code) non-zero.

use crate::listener::ListenCtx;
use crate::protocol::{CheckItem, SelfTestReport};
use rvt_probe::detect::InitSystem;
use rvt_snapstore::SystemSnapshotTool;

fn check(name: &str, required: bool, ok: bool, detail: impl Into<String>) -> CheckItem {
    CheckItem { name: name.to_string(), ok, required, detail: detail.into() }
}

pub async fn run(ctx: &ListenCtx) -> SelfTestReport {
    let mut checks = Vec::new();

    let descriptor = &ctx.probe.descriptor;
    checks.push(check(
        "init-system",
        true,
        descriptor.init_system != InitSystem::Unknown,
        format!("{:?}", descriptor.init_system),
    ));
    checks.push(check(
        "service-control",
        true,
        ctx.probe.service_control.is_some(),
        if ctx.probe.service_control.is_some() {
            "restart command available"
        } else {
            "no usable service restart command"
        },
    ));

    // Snapshot store must accept writes or no change can ever open
    let store_probe = ctx.store.root().join(".selftest");
    let store_ok = std::fs::write(&store_probe, b"probe")
        .and_then(|()| std::fs::remove_file(&store_probe))
        .is_ok();
    checks.push(check(
        "snapshot-store",
        true,
        store_ok,
        ctx.store.root().display().to_string(),
    ));

    let (safe_mode, reason) = {
        let state = ctx.state.lock();
        (state.safe_mode, state.safe_mode_reason.clone())
    };
    checks.push(check(
        "watcher",
        true,
        !safe_mode,
        reason.unwrap_or_else(|| "event delivery healthy".into()),
    ));

    let config = ctx.config.read();
    let gated = config.policies.categories().any(|c| {
        config.policies.for_category(c).connectivity_check
    });
    checks.push(check(
        "connectivity-endpoints",
        gated,
        !gated || !config.connectivity_endpoints.is_empty(),
        format!("{} endpoint(s) configured", config.connectivity_endpoints.len()),
    ));

    if config.snapshot_enable_system_tool {
        let present = SystemSnapshotTool::detect().is_some();
        checks.push(check(
            "system-snapshot-tool",
            true,
            present,
            if present { "timeshift detected" } else { "enabled but not installed" },
        ));
    } else {
        checks.push(check("system-snapshot-tool", false, true, "disabled"));
    }

    let watched: usize = ctx.classifier.read().expand().iter().map(|(_, p)| p.len()).sum();
    checks.push(check(
        "watched-paths",
        false,
        watched > 0,
        format!("{watched} file(s) currently match the configured globs"),
    ));

    SelfTestReport::from_checks(checks)
}
