// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control-plane socket.
//!
//! Accepts connections and serves them on spawned tasks so the sampler
//! loop never blocks on client I/O. One request per connection;
//! `WatchMetrics` upgrades the connection to a frame stream.

mod mutations;
mod query;

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::health::TickHealth;
use crate::lifecycle::DaemonSupervisor;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub supervisor: DaemonSupervisor,
    pub health: Arc<TickHealth>,
    pub start_time: Instant,
    pub monitor_interval_seconds: f64,
    pub shutdown: Arc<Notify>,
}

/// Listener task accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Accept loop; runs until the daemon exits.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("connection timeout")
                                }
                                _ => error!("connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Queries poll frequently; keep them at debug
    if matches!(
        request,
        Request::ListProcesses | Request::Status | Request::Health | Request::Ping
    ) {
        debug!(request = ?request, "received query");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    if matches!(request, Request::WatchMetrics) {
        return stream_metrics(&mut writer, ctx).await;
    }

    let response = handle_request(request, ctx).await;
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

/// Push one frame per sampler tick until the client goes away.
async fn stream_metrics(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError> {
    let mut frames = ctx.supervisor.subscribe_frames();
    protocol::write_response(writer, &Response::Watching, DEFAULT_TIMEOUT).await?;

    loop {
        match frames.recv().await {
            Ok(frame) => {
                let bytes = protocol::encode(&frame)?;
                if protocol::write_message(writer, &bytes).await.is_err() {
                    return Ok(()); // client gone
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "metrics subscriber lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

async fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
        Request::Status
        | Request::Health
        | Request::ListProcesses
        | Request::GetProcess { .. }
        | Request::CrashStats { .. }
        | Request::TailLog { .. }
        | Request::ListAlerts { .. }
        | Request::SystemInfo
        | Request::SystemMetrics
        | Request::DisabledProcesses
        | Request::QuarantinedProcesses => query::handle(request, ctx).await,
        Request::AddProcess { .. }
        | Request::RemoveProcess { .. }
        | Request::Start { .. }
        | Request::Stop { .. }
        | Request::Restart { .. }
        | Request::ForceEnable { .. }
        | Request::ResetCrashes { .. }
        | Request::AcknowledgeAlert { .. }
        | Request::ResolveAlert { .. } => mutations::handle(request, ctx).await,
        Request::WatchMetrics => {
            // Handled at the connection level
            Response::error("invalid_request", "WatchMetrics requires a stream")
        }
    }
}
