// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.

use rvt_daemon::protocol::{self, ProtocolError};
use rvt_daemon::{ErrorKind, Payload, Request, Response};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;

/// Timeout for one request/response exchange.
fn timeout_ipc() -> Duration {
    std::env::var("REVERTIT_TIMEOUT_IPC_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not reachable at {0} (is revertitd running?)")]
    NotReachable(PathBuf),

    #[error("request timed out")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon error: {message}")]
    Daemon { kind: ErrorKind, message: String },

    #[error("malformed response from daemon")]
    MalformedResponse,
}

/// Connection to the control socket.
pub struct DaemonClient {
    stream: UnixStream,
}

impl DaemonClient {
    pub fn socket_path() -> PathBuf {
        std::env::var_os("REVERTIT_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/run/meshadmin-revertit.sock"))
    }

    pub async fn connect() -> Result<Self, ClientError> {
        let path = Self::socket_path();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|_| ClientError::NotReachable(path))?;
        Ok(Self { stream })
    }

    /// One request/response exchange. Daemon-side errors are surfaced as
    /// [`ClientError::Daemon`] so commands map them to exit codes in a
    /// single place.
    pub async fn request(&mut self, request: Request) -> Result<Payload, ClientError> {
        let exchange = async {
            protocol::write_message(&mut self.stream, &request).await?;
            protocol::read_message::<Response, _>(&mut self.stream).await
        };
        let response =
            tokio::time::timeout(timeout_ipc(), exchange).await.map_err(|_| ClientError::Timeout)??;
        if let Some(error) = response.error {
            return Err(ClientError::Daemon { kind: error.kind, message: error.message });
        }
        response.value.ok_or(ClientError::MalformedResponse)
    }
}
