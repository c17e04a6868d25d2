// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS facade: spawning, signalling, and sampling supervised children.
//!
//! The facade must never panic on an already-exited process; sampling a
//! dead PID reports `SampleError::NotFound` and signalling one succeeds.

mod unix;

pub use unix::UnixOsAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOsAdapter, SpawnedProcess};

use async_trait::async_trait;
use pg_core::{HostMetrics, MetricSample};
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use thiserror::Error;

/// Signals the supervisor delivers to a child's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Term,
    Kill,
    Interrupt,
}

/// What to launch and where its output goes.
///
/// The log files are opened append-only by the supervisor and handed to the
/// child; they are the only resource the two share.
#[derive(Debug)]
pub struct SpawnRequest {
    /// Shell command line, run via `sh -c`.
    pub command: String,
    pub cwd: PathBuf,
    /// Overrides applied on top of the daemon environment.
    pub env: HashMap<String, String>,
    pub stdout: File,
    pub stderr: File,
}

/// Handle for one spawned child.
///
/// Carries the PID and process-group id; the inner waitable half is
/// consumed by `wait_exit`, which must be called exactly once.
#[derive(Debug)]
pub struct Child {
    pub pid: u32,
    pub pgid: i32,
    pub(crate) inner: ChildInner,
}

#[derive(Debug)]
pub(crate) enum ChildInner {
    Unix(tokio::process::Child),
    #[cfg(any(test, feature = "test-support"))]
    Fake(tokio::sync::oneshot::Receiver<Option<i32>>),
}

/// Errors from starting a child.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpawnError {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("working directory missing: {0}")]
    WorkingDirMissing(String),

    #[error("spawn failed: {0}")]
    Other(String),
}

/// Errors from sampling a PID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// The process is gone; the sampler reports this as a disappearance.
    #[error("process not found: pid {0}")]
    NotFound(u32),

    #[error("sampling failed: {0}")]
    Io(String),
}

/// Errors from the remaining facade operations.
#[derive(Debug, Error)]
pub enum OsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Facade over the host OS.
///
/// The rest of the core depends only on this surface; production uses
/// [`UnixOsAdapter`], tests use `FakeOsAdapter`.
#[async_trait]
pub trait OsAdapter: Clone + Send + Sync + 'static {
    /// Start a child in a new process group with stdout/stderr wired to the
    /// supplied files.
    async fn spawn(&self, req: SpawnRequest) -> Result<Child, SpawnError>;

    /// Best-effort signal to a process group. An already-exited target is
    /// not an error.
    async fn signal(&self, pgid: i32, kind: SignalKind) -> Result<(), OsError>;

    /// Await child termination. Must be called exactly once per child.
    /// `None` means the child was killed by a signal.
    async fn wait_exit(&self, child: Child) -> Result<Option<i32>, OsError>;

    /// Read resource usage for a live PID. `uptime_seconds` is left at zero;
    /// the supervisor fills it from the run start time.
    async fn sample(&self, pid: u32) -> Result<MetricSample, SampleError>;

    /// Host-wide CPU/memory aggregates.
    async fn host_metrics(&self) -> Result<HostMetrics, OsError>;

    /// Listening TCP sockets as `(port, pid)` pairs.
    async fn list_connections(&self) -> Result<Vec<(u16, u32)>, OsError>;
}
