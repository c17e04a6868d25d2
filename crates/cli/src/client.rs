// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use pg_daemon::protocol::{self, ProtocolError, Request, Response};
use pg_daemon::Paths;
use pg_engine::MetricsFrame;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::daemon_process;

/// Timeout for one IPC request/response exchange.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("PG_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for the daemon to start.
pub fn timeout_connect() -> Duration {
    parse_duration_ms("PG_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(10))
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (start it with `pg daemon start`)")]
    DaemonNotRunning,

    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon rejected request: {detail} ({kind})")]
    Rejected { kind: String, detail: String },

    #[error("unexpected response from daemon")]
    UnexpectedResponse,

    #[error("could not determine state directory")]
    NoStateDir,
}

/// One-connection-per-request client for the daemon socket.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// For query commands: connect only, never auto-start.
    pub fn for_query() -> Result<Self, ClientError> {
        let socket_path = socket_path()?;
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self { socket_path })
    }

    /// For action commands: start the daemon in the background when it is
    /// not running yet.
    pub async fn for_action() -> Result<Self, ClientError> {
        let socket_path = socket_path()?;
        if !socket_path.exists() {
            daemon_process::start_background(&socket_path, timeout_connect()).await?;
        }
        Ok(Self { socket_path })
    }

    /// Send one request; surface `Response::Error` as `Rejected`.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::DaemonNotRunning)?;
        let (mut reader, mut writer) = stream.into_split();

        let bytes = protocol::encode(&request)?;
        protocol::write_message(&mut writer, &bytes).await?;

        let raw = tokio::time::timeout(timeout_ipc(), protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        let response: Response = protocol::decode(&raw)?;

        match response {
            Response::Error { error, detail } => Err(ClientError::Rejected {
                kind: error,
                detail,
            }),
            other => Ok(other),
        }
    }

    /// Open a metrics stream and hand each frame to `on_frame` until the
    /// daemon goes away or `on_frame` returns false.
    pub async fn watch(
        &self,
        mut on_frame: impl FnMut(MetricsFrame) -> bool,
    ) -> Result<(), ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::DaemonNotRunning)?;
        let (mut reader, mut writer) = stream.into_split();

        let bytes = protocol::encode(&Request::WatchMetrics)?;
        protocol::write_message(&mut writer, &bytes).await?;

        let raw = tokio::time::timeout(timeout_ipc(), protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        match protocol::decode::<Response>(&raw)? {
            Response::Watching => {}
            Response::Error { error, detail } => {
                return Err(ClientError::Rejected {
                    kind: error,
                    detail,
                })
            }
            _ => return Err(ClientError::UnexpectedResponse),
        }

        loop {
            let raw = match protocol::read_message(&mut reader).await {
                Ok(raw) => raw,
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            let frame: MetricsFrame = protocol::decode(&raw)?;
            if !on_frame(frame) {
                return Ok(());
            }
        }
    }
}

/// Daemon socket path from the shared state-directory resolution.
pub fn socket_path() -> Result<PathBuf, ClientError> {
    let paths = Paths::load().map_err(|_| ClientError::NoStateDir)?;
    Ok(paths.socket_path)
}
