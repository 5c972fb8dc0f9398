// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! revertit: CLI front-end for the RevertIT daemon.
//!
//! Exit codes: 0 success; 2 daemon unreachable; 3 change/snapshot not
//! found; 4 change not confirmable; non-zero from `test` when a
//! required capability is missing.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use client::{ClientError, DaemonClient};
use exit_error::{
    ExitError, EXIT_FAILURE, EXIT_NOT_CONFIRMABLE, EXIT_NOT_FOUND, EXIT_UNREACHABLE,
};
use rvt_daemon::{ChangeFilter, ErrorKind, Payload, Request};

#[derive(Parser)]
#[command(name = "revertit", version, about = "Control the RevertIT safety daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon status (exit 0 when reachable, 2 otherwise)
    Status,
    /// List open and grace-state changes
    Timeouts,
    /// Full detail for one change (JSON)
    Show { change_id: String },
    /// Accept a pending change; its content becomes the new baseline
    Confirm { change_id: String },
    /// Reject a pending change and revert it immediately
    Cancel { change_id: String },
    /// Snapshot operations
    Snapshots {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
    /// Probe daemon capabilities; machine-readable report on stdout
    Test,
}

#[derive(Subcommand)]
enum SnapshotCommand {
    /// List snapshots, newest first
    List,
    /// Capture a manual snapshot of every watched path
    Create {
        #[arg(long)]
        description: Option<String>,
    },
    /// Restore a snapshot's files (outside the change lifecycle)
    Restore { snapshot_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.code);
        }
    }
}

async fn run(command: Command) -> Result<(), ExitError> {
    let mut client = DaemonClient::connect().await.map_err(unreachable_error)?;

    match command {
        Command::Status => {
            let response = request(&mut client, Request::Status).await?;
            if let Payload::Status(status) = response {
                print!("{}", output::render_status(&status));
            }
        }
        Command::Timeouts => {
            let response =
                request(&mut client, Request::ListChanges { filter: ChangeFilter::Active })
                    .await?;
            if let Payload::Changes { changes } = response {
                print!("{}", output::render_changes(&changes));
            }
        }
        Command::Show { change_id } => {
            let response = request(&mut client, Request::ShowChange { change_id }).await?;
            if let Payload::Change(detail) = response {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&detail)
                        .map_err(|e| ExitError::new(EXIT_FAILURE, e.to_string()))?
                );
            }
        }
        Command::Confirm { change_id } => {
            request(&mut client, Request::Confirm { change_id: change_id.clone() }).await?;
            println!("{change_id} confirmed");
        }
        Command::Cancel { change_id } => {
            request(&mut client, Request::Cancel { change_id: change_id.clone() }).await?;
            println!("{change_id} cancelled, reverting");
        }
        Command::Snapshots { command } => match command {
            SnapshotCommand::List => {
                let response = request(&mut client, Request::SnapshotsList).await?;
                if let Payload::Snapshots { snapshots } = response {
                    print!("{}", output::render_snapshots(&snapshots));
                }
            }
            SnapshotCommand::Create { description } => {
                let response =
                    request(&mut client, Request::SnapshotsCreate { description }).await?;
                if let Payload::SnapshotCreated { snapshot_id } = response {
                    println!("{snapshot_id}");
                }
            }
            SnapshotCommand::Restore { snapshot_id } => {
                let response =
                    request(&mut client, Request::SnapshotsRestore { snapshot_id }).await?;
                if let Payload::SnapshotRestored { snapshot_id, files } = response {
                    println!("{snapshot_id}: {files} file(s) restored");
                }
            }
        },
        Command::Test => {
            let response = request(&mut client, Request::SelfTest).await?;
            if let Payload::SelfTest(report) = response {
                // machine-readable contract: JSON on stdout
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report)
                        .map_err(|e| ExitError::new(EXIT_FAILURE, e.to_string()))?
                );
                if !report.ok {
                    return Err(ExitError::new(
                        EXIT_FAILURE,
                        "required capabilities missing",
                    ));
                }
            }
        }
    }
    Ok(())
}

async fn request(client: &mut DaemonClient, req: Request) -> Result<Payload, ExitError> {
    client.request(req).await.map_err(|e| match e {
        ClientError::Daemon { kind: ErrorKind::NotFound, message } => {
            ExitError::new(EXIT_NOT_FOUND, message)
        }
        ClientError::Daemon { kind: ErrorKind::NotConfirmable, message } => {
            ExitError::new(EXIT_NOT_CONFIRMABLE, message)
        }
        ClientError::Daemon { message, .. } => ExitError::new(EXIT_FAILURE, message),
        other => ExitError::new(EXIT_UNREACHABLE, other.to_string()),
    })
}

fn unreachable_error(e: ClientError) -> ExitError {
    ExitError::new(EXIT_UNREACHABLE, e.to_string())
}
