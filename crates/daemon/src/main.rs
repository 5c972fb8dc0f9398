// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RevertIT Daemon (revertitd)
//!
//! Root-privileged safety daemon: snapshots watched configuration files
//! on edit, opens a confirmation window, and restores the prior state
//! when the operator does not confirm in time.
//!
//! Architecture:
//! - Listener task: socket I/O, validates requests, emits events
//! - Watcher task: debounced filesystem events
//! - Engine loop (this file): applies and handles events sequentially

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod classifier;
mod config;
mod engine;
mod env;
mod event_bus;
mod lifecycle;
mod listener;
mod protocol;
mod scheduler;
mod self_test;
mod watcher;

use lifecycle::{DaemonPaths, LifecycleError, StartupResult};
use rvt_core::{Clock, SystemClock};
use rvt_storage::write_checkpoint;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut force_reset = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("revertitd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--force-reset" => force_reset = true,
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: revertitd [--force-reset]");
                std::process::exit(1);
            }
        }
    }

    let paths = DaemonPaths::resolve();
    let _log_guard = setup_logging(&paths)?;

    info!(state_dir = %paths.state_dir.display(), "starting revertitd");

    let StartupResult { runtime, mut reader, listen_ctx, socket, lock_file } =
        match lifecycle::startup(&paths, force_reset).await {
            Ok(result) => result,
            Err(LifecycleError::LockFailed(_)) => {
                let pid = std::fs::read_to_string(&paths.lock).unwrap_or_default();
                eprintln!("revertitd is already running (pid {})", pid.trim());
                std::process::exit(1);
            }
            Err(e) => {
                error!(error = %e, "startup failed");
                return Err(e.into());
            }
        };

    // Socket server
    tokio::spawn(listener::Listener::new(socket, Arc::clone(&listen_ctx)).run());

    // Filesystem watcher
    let watcher_handle = watcher::spawn(
        runtime.bus.clone(),
        Arc::clone(&runtime.classifier),
        Arc::clone(&runtime.suppress),
        SystemClock,
        env::debounce_window(),
    );

    // Group-commit flush task (~10ms durability window)
    {
        let bus = runtime.bus.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_millis(10));
            loop {
                tick.tick().await;
                if bus.needs_flush() {
                    if let Err(e) = bus.flush() {
                        error!(error = %e, "journal flush failed");
                    }
                }
            }
        });
    }

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    // NOTE: intervals are created outside the loop: select! re-evaluates
    // its branches each iteration, and a fresh sleep would reset on every
    // event, starving the timers under load
    let mut timer_check = tokio::time::interval(env::timer_check_interval());
    let mut housekeeping = tokio::time::interval(env::housekeeping_interval());

    info!(socket = %paths.socket.display(), "daemon ready");
    println!("READY");

    loop {
        tokio::select! {
            entry = reader.recv() => {
                let Some(entry) = entry else { break };
                runtime.state.lock().apply(&entry.event);
                runtime.process(&entry.event).await;
                reader.mark_processed(entry.seq);
            }
            _ = timer_check.tick() => {
                for event in runtime.fired_timer_events() {
                    if let Err(e) = runtime.bus.send(event) {
                        error!(error = %e, "cannot journal timer fire");
                    }
                }
            }
            _ = housekeeping.tick() => {
                housekeeping_pass(&runtime, &reader, &paths).await;
            }
            _ = sighup.recv() => {
                reload(&runtime, &watcher_handle, &paths);
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
                break;
            }
            _ = sigint.recv() => {
                info!("SIGINT received");
                break;
            }
        }
    }

    shutdown(&runtime, &reader, &paths).await;
    drop(lock_file);
    Ok(())
}

/// Purge aged-out terminal changes, run snapshot retention, and
/// checkpoint the journal past its size threshold.
async fn housekeeping_pass(
    runtime: &engine::Runtime<SystemClock>,
    reader: &event_bus::EventReader,
    paths: &DaemonPaths,
) {
    let now_ms = runtime.clock.epoch_ms();
    let audit_ms = env::audit_window().as_millis() as u64;

    let purgeable = runtime.state.lock().purgeable_changes(now_ms, audit_ms);
    for change_id in purgeable {
        info!(%change_id, "purging change past the audit window");
        if let Err(e) = runtime.bus.send(rvt_core::Event::ChangePurged { change_id }) {
            error!(error = %e, "cannot journal purge");
        }
    }

    // Retention never touches manual snapshots, active baselines, or
    // snapshots backing in-flight changes
    let protected: HashSet<_> = {
        let state = runtime.state.lock();
        state
            .baselines
            .values()
            .map(|b| b.snapshot_id.clone())
            .chain(state.changes.values().filter(|c| !c.is_terminal()).map(|c| c.snapshot_id.clone()))
            .collect()
    };
    let (max_snapshots, max_age) = {
        let config = runtime.config.read();
        (config.snapshot_max, config.snapshot_max_age)
    };
    let store = Arc::clone(&runtime.store);
    let retention = tokio::task::spawn_blocking(move || {
        store.retain(max_snapshots, max_age, chrono::Utc::now(), &protected)
    })
    .await;
    match retention {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(error = %e, "retention sweep failed"),
        Err(e) => warn!(error = %e, "retention worker died"),
    }

    checkpoint_if_needed(runtime, reader, paths, false);
}

fn checkpoint_if_needed(
    runtime: &engine::Runtime<SystemClock>,
    reader: &event_bus::EventReader,
    paths: &DaemonPaths,
    force: bool,
) {
    let journal = reader.journal();
    let mut journal = journal.lock();
    if !force && journal.approx_len() < env::journal_compact_threshold() {
        return;
    }
    let seq = journal.processed_seq();
    let state = runtime.state.lock().clone();
    if let Err(e) = write_checkpoint(&paths.checkpoint, &state, seq) {
        error!(error = %e, "checkpoint write failed");
        return;
    }
    if let Err(e) = journal.compact_through(seq) {
        error!(error = %e, "journal compaction failed");
        return;
    }
    info!(seq, "checkpoint written, journal compacted");
}

/// SIGHUP: re-read configuration; a bad file keeps the old one.
fn reload(
    runtime: &engine::Runtime<SystemClock>,
    watcher_handle: &watcher::WatcherHandle,
    paths: &DaemonPaths,
) {
    info!(config = %paths.config.display(), "reloading configuration");
    let loaded = if paths.config.exists() {
        config::Config::load(&paths.config, &paths.state_dir)
    } else {
        Ok(config::Config::fallback(&paths.state_dir))
    };
    match loaded {
        Ok(new_config) => {
            *runtime.classifier.write() = classifier::Classifier::compile(&new_config.monitoring);
            *runtime.config.write() = new_config;
            watcher_handle.rearm();
            if let Err(e) = runtime.bus.send(rvt_core::Event::PolicyReloaded {
                at_ms: runtime.clock.epoch_ms(),
            }) {
                error!(error = %e, "cannot journal reload");
            }
        }
        Err(e) => error!(error = %e, "reload rejected, keeping previous configuration"),
    }
}

/// Graceful shutdown: finish in-flight reverts, drain the queue into
/// state, persist a checkpoint, release the socket.
async fn shutdown(
    runtime: &engine::Runtime<SystemClock>,
    reader: &event_bus::EventReader,
    paths: &DaemonPaths,
) {
    info!("shutting down");
    runtime.drain_reverts(std::time::Duration::from_secs(30)).await;

    // Apply whatever the workers managed to journal; handlers do not run
    // (their side effects resume via startup reconciliation)
    {
        let journal = reader.journal();
        let mut journal = journal.lock();
        while let Some(entry) = journal.next_unprocessed() {
            runtime.state.lock().apply(&entry.event);
            journal.mark_processed(entry.seq);
        }
    }
    if let Err(e) = runtime.bus.flush() {
        error!(error = %e, "final flush failed");
    }
    checkpoint_if_needed(runtime, reader, paths, true);

    let _ = std::fs::remove_file(&paths.socket);
    let _ = std::fs::remove_file(&paths.lock);
    info!("shutdown complete");
}

fn setup_logging(
    paths: &DaemonPaths,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    use tracing_subscriber::EnvFilter;

    // Config is not loaded yet; start from the env, then the config's
    // log_level applies through the default when REVERTIT_LOG is unset
    let filter = EnvFilter::try_from_env("REVERTIT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if std::env::var_os("REVERTIT_LOG_STDERR").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&paths.log_dir)?;
    rotate_log_if_needed(&paths.log_dir.join("revertitd.log"));
    let appender = tracing_appender::rolling::never(&paths.log_dir, "revertitd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    Ok(Some(guard))
}

/// Rotate an oversized log to `.old` at startup (single generation).
fn rotate_log_if_needed(path: &std::path::Path) {
    const MAX_LOG_BYTES: u64 = 16 * 1024 * 1024;
    let Ok(meta) = std::fs::metadata(path) else { return };
    if meta.len() > MAX_LOG_BYTES {
        let _ = std::fs::rename(path, path.with_extension("log.old"));
    }
}

fn print_help() {
    println!("revertitd {}", env!("CARGO_PKG_VERSION"));
    println!("RevertIT daemon - snapshots watched config files and reverts");
    println!("unconfirmed changes before they can lock you out.");
    println!();
    println!("USAGE:");
    println!("    revertitd [--force-reset]");
    println!();
    println!("The daemon is managed by the init system and controlled with");
    println!("the `revertit` CLI over {}", env::DEFAULT_SOCKET);
    println!();
    println!("OPTIONS:");
    println!("    --force-reset    Discard an unreadable ledger journal/checkpoint");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}
