// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. One
//! request per connection; `WatchMetrics` keeps the connection open and
//! streams one `MetricsFrame` message per sampler tick.

use pg_core::{Alert, HostMetrics, ProcessConfig};
use pg_engine::{CrashStats, LogStream, ProcessStatus, SupervisorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

fn default_tail_lines() -> usize {
    100
}

fn default_stream() -> LogStream {
    LogStream::Stdout
}

/// Request from the CLI (or any control-plane client) to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health-check ping.
    Ping,

    /// Daemon overview.
    Status,

    /// Sampler-liveness health probe.
    Health,

    /// Request daemon shutdown.
    Shutdown,

    /// All processes with their runtime state.
    ListProcesses,

    /// One process by name.
    GetProcess { name: String },

    /// Register a new process.
    AddProcess { config: ProcessConfig },

    /// Deregister a process (kills its child if running).
    RemoveProcess { name: String },

    Start {
        name: String,
        #[serde(default)]
        ignore_dependencies: bool,
    },

    Stop { name: String },

    Restart {
        name: String,
        #[serde(default)]
        ignore_dependencies: bool,
    },

    /// Clear disable/quarantine and crash history, then start.
    ForceEnable { name: String },

    /// Clear crash records and counters only.
    ResetCrashes { name: String },

    CrashStats { name: String },

    /// Recent log lines for one process stream.
    TailLog {
        name: String,
        #[serde(default = "default_tail_lines")]
        lines: usize,
        #[serde(default = "default_stream")]
        stream: LogStream,
    },

    ListAlerts {
        #[serde(default)]
        active_only: bool,
    },

    AcknowledgeAlert { id: String },

    ResolveAlert { id: String },

    SystemInfo,

    SystemMetrics,

    /// Names of disabled processes.
    DisabledProcesses,

    /// Names of quarantined processes.
    QuarantinedProcesses,

    /// Switch this connection to a metrics stream: the daemon replies
    /// `Watching`, then pushes one `MetricsFrame` per sampler tick.
    WatchMetrics,
}

/// Response from the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Ok,
    ShuttingDown,
    Status { status: DaemonStatus },
    Health { healthy: bool },
    Processes { processes: Vec<ProcessStatus> },
    Process { process: ProcessStatus },
    CrashStats { stats: CrashStats },
    LogLines { lines: Vec<String> },
    Alerts { alerts: Vec<Alert> },
    Names { names: Vec<String> },
    SystemInfo { info: SystemInfo },
    SystemMetrics { metrics: SystemMetrics },
    /// Acknowledgement that a metrics stream follows.
    Watching,
    /// Structured failure: machine-readable kind + human detail.
    Error { error: String, detail: String },
}

impl Response {
    pub fn error(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Response::Error {
            error: kind.into(),
            detail: detail.into(),
        }
    }
}

impl From<&SupervisorError> for Response {
    fn from(e: &SupervisorError) -> Self {
        Response::error(e.kind(), e.to_string())
    }
}

/// Daemon overview for `Status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub processes: usize,
    pub healthy: bool,
}

/// `SystemInfo` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub monitor_interval_seconds: f64,
    pub processes_total: usize,
    /// Process counts keyed by lifecycle state name.
    pub by_state: BTreeMap<String, usize>,
    pub active_alerts: usize,
}

/// One listening socket for `SystemMetrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortBinding {
    pub port: u16,
    pub pid: u32,
    /// Supervised process owning the PID, when it is one of ours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
}

/// `SystemMetrics` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub host: HostMetrics,
    pub listeners: Vec<PortBinding>,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
