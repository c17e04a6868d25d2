// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: paths, startup, shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use pg_adapters::UnixOsAdapter;
use pg_core::{ConfigError, SystemClock};
use pg_engine::{AlertBus, AlertBusConfig, LogManager, Supervisor, SupervisorConfig};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::info;

use crate::config::GuardConfig;
use crate::health::TickHealth;

/// Daemon supervisor with concrete adapter types.
pub type DaemonSupervisor = Supervisor<UnixOsAdapter, SystemClock>;

/// Filesystem layout of the daemon state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root state directory (e.g. ~/.local/state/pg)
    pub state_dir: PathBuf,
    /// Unix control socket
    pub socket_path: PathBuf,
    /// Lock/PID file
    pub lock_path: PathBuf,
    /// Daemon log file
    pub log_path: PathBuf,
    /// Configuration file
    pub config_path: PathBuf,
    /// Whether `PG_CONFIG` named the config file explicitly
    pub config_explicit: bool,
}

impl Paths {
    /// Resolve paths from the environment.
    ///
    /// `PG_STATE_DIR` overrides everything (tests); otherwise the XDG
    /// state directory. `PG_CONFIG` points at an explicit config file.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let (config_path, config_explicit) = match std::env::var("PG_CONFIG") {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (state_dir.join("config.json"), false),
        };
        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            config_path,
            config_explicit,
            state_dir,
        })
    }

    /// Load the configuration file, or defaults when the implicit path is
    /// absent. An explicitly named file must exist.
    pub fn load_config(&self) -> Result<GuardConfig, LifecycleError> {
        if self.config_path.exists() {
            Ok(GuardConfig::load(&self.config_path)?)
        } else if self.config_explicit {
            Err(ConfigError::Invalid(format!(
                "config file not found: {}",
                self.config_path.display()
            ))
            .into())
        } else {
            info!(
                path = %self.config_path.display(),
                "no config file, starting with defaults"
            );
            Ok(GuardConfig::default())
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine error: {0}")]
    Engine(String),
}

/// Live daemon state.
pub struct DaemonState {
    pub paths: Paths,
    // NOTE(lifetime): held to maintain the exclusive PID-file lock;
    // released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub config: GuardConfig,
    pub supervisor: DaemonSupervisor,
    pub health: Arc<TickHealth>,
    pub start_time: Instant,
}

/// Result of daemon startup; the listener is spawned by the caller.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

/// Start the daemon: lock, build the engine, register configured
/// processes, bind the socket.
pub async fn startup(paths: &Paths, config: GuardConfig) -> Result<StartupResult, LifecycleError> {
    match startup_inner(paths, config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up on lock failure - those files belong to the
            // already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(paths);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    paths: &Paths,
    config: GuardConfig,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Acquire the lock first - prevents races. Open without truncating so
    // a failed lock does not wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // Build the engine
    let log_dir = config
        .log_dir
        .clone()
        .unwrap_or_else(|| paths.state_dir.join("logs"));
    let logs = Arc::new(LogManager::new(
        log_dir,
        config.log_rotate_bytes,
        config.log_rotate_keep,
    )?);
    let sinks = config.notifications.build_sinks();
    info!(sinks = sinks.len(), "notification sinks configured");
    let alerts = Arc::new(AlertBus::new(
        SystemClock,
        AlertBusConfig {
            cooldown: config.notifications.cooldown(),
            ..AlertBusConfig::default()
        },
        sinks,
    ));
    let supervisor = Supervisor::new(
        UnixOsAdapter::new(),
        SystemClock,
        alerts,
        logs,
        SupervisorConfig::default(),
    );

    // Register configured processes, dependencies first
    let ordered = config.processes_in_dependency_order()?;
    for process in ordered {
        let name = process.name.clone();
        supervisor
            .register(process)
            .map_err(|e| LifecycleError::Engine(format!("register {name}: {e}")))?;
    }
    info!(
        processes = config.processes.len(),
        "registered configured processes"
    );

    // Remove stale socket and bind last, after all validation passes
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    let health = Arc::new(TickHealth::new(config.monitor_interval()));

    info!("daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            paths: paths.clone(),
            lock_file,
            config,
            supervisor,
            health,
            start_time: Instant::now(),
        },
        listener,
    })
}

impl DaemonState {
    /// Remove socket and PID file; the lock releases when the file drops.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");
        if self.paths.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.socket_path) {
                tracing::warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                tracing::warn!(error = %e, "failed to remove PID file");
            }
        }
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Clean up resources on startup failure.
fn cleanup_on_failure(paths: &Paths) {
    if paths.socket_path.exists() {
        let _ = std::fs::remove_file(&paths.socket_path);
    }
    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }
}

/// State directory: `PG_STATE_DIR`, else XDG state home, else
/// `~/.local/state/pg`.
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("PG_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("pg"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoStateDir)?;
    Ok(home.join(".local/state/pg"))
}
