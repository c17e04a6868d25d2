// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for supervisor operations.

use pg_adapters::SpawnError;
use pg_core::ConfigError;
use thiserror::Error;

/// Errors surfaced to control-plane callers.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("process not found: {0}")]
    NotFound(String),

    #[error("process {0} is disabled; force-enable to clear")]
    Disabled(String),

    #[error("process {process} is quarantined for another {remaining_seconds}s")]
    Quarantined {
        process: String,
        remaining_seconds: u64,
    },

    #[error("dependencies of {process} not running: {missing:?}")]
    DependencyNotReady {
        process: String,
        missing: Vec<String>,
    },

    #[error("process {0} is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn {process}: {source}")]
    Spawn {
        process: String,
        #[source]
        source: SpawnError,
    },

    #[error("process {0} is shutting down")]
    Unavailable(String),

    #[error("unknown alert id: {0}")]
    UnknownAlert(String),

    #[error("log access failed: {0}")]
    Log(String),
}

impl SupervisorError {
    /// Stable machine-readable kind, used in control-plane error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            SupervisorError::NotFound(_) => "not_found",
            SupervisorError::Disabled(_) => "disabled",
            SupervisorError::Quarantined { .. } => "quarantined",
            SupervisorError::DependencyNotReady { .. } => "dependency_not_ready",
            SupervisorError::AlreadyRunning(_) => "already_running",
            SupervisorError::Config(_) => "config_error",
            SupervisorError::Spawn { .. } => "spawn_error",
            SupervisorError::Unavailable(_) => "unavailable",
            SupervisorError::UnknownAlert(_) => "not_found",
            SupervisorError::Log(_) => "io_error",
        }
    }
}
