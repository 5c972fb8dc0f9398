// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control socket.
//!
//! Runs in a spawned task, accepting connections and serving requests
//! without blocking the engine loop. Mutations are validated against
//! current state and emitted onto the event bus; the engine serializes
//! them with everything else.
//!
//! Authentication is the peer's OS identity: only root (or the uid the
//! daemon itself runs as, for unprivileged test rigs) may speak.

mod handlers;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::event_bus::EventBus;
use crate::protocol::{self, Request, Response};
use parking_lot::{Mutex, RwLock};
use rvt_probe::HostProbe;
use rvt_snapstore::SnapshotStore;
use rvt_storage::{Journal, LedgerState};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub bus: EventBus,
    pub state: Arc<Mutex<LedgerState>>,
    pub journal: Arc<Mutex<Journal>>,
    pub store: Arc<SnapshotStore>,
    pub classifier: Arc<RwLock<Classifier>>,
    pub config: Arc<RwLock<Config>>,
    pub suppress: Arc<Mutex<HashSet<PathBuf>>>,
    pub probe: HostProbe,
    pub start_time: Instant,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("unauthorized peer uid {0}")]
    Unauthorized(u32),
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Accept until the daemon shuts down, one task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        match handle_connection(stream, &ctx).await {
                            Ok(())
                            | Err(ConnectionError::Protocol(
                                protocol::ProtocolError::ConnectionClosed,
                            )) => debug!("client disconnected"),
                            Err(ConnectionError::Unauthorized(uid)) => {
                                warn!(uid, "rejected control connection")
                            }
                            Err(e) => error!(error = %e, "connection error"),
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }
}

/// Uid the daemon runs as, read from its own /proc entry.
fn own_uid() -> u32 {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self").map(|m| m.uid()).unwrap_or(0)
}

async fn handle_connection(
    mut stream: UnixStream,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError> {
    let peer_uid = stream
        .peer_cred()
        .map(|cred| cred.uid())
        .map_err(|_| ConnectionError::Unauthorized(u32::MAX))?;
    if peer_uid != 0 && peer_uid != own_uid() {
        return Err(ConnectionError::Unauthorized(peer_uid));
    }
    let actor = if peer_uid == 0 { "root".to_string() } else { format!("uid:{peer_uid}") };

    loop {
        let request: Request = protocol::read_message(&mut stream).await?;
        debug!(?request, peer_uid, "control request");
        let response: Response = handlers::dispatch(ctx, request, &actor).await;
        protocol::write_message(&mut stream, &response).await?;
    }
}
