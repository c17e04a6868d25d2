// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ProcessGuard daemon (pgd).
//!
//! Background process that owns the supervisor engine and the control
//! socket.
//!
//! Architecture:
//! - Listener task: spawned task handling socket I/O per connection
//! - Sampler loop: main task ticking the metric sampler and health stamp

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pg_daemon::lifecycle::{self, LifecycleError, Paths, StartupResult};
use pg_daemon::listener::{ListenCtx, Listener};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pgd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: pgd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let paths = Paths::load()?;
    std::fs::create_dir_all(&paths.state_dir)?;

    // Validate configuration before anything else; a bad file refuses start
    let config = match paths.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pgd: configuration error: {e}");
            std::process::exit(1);
        }
    };

    rotate_log_if_needed(&paths.log_path);
    let _log_guard = setup_logging(&paths, &config.log_level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
    } = match lifecycle::startup(&paths, config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("pgd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {}", e);
            eprintln!("pgd: {e}");
            std::process::exit(1);
        }
    };

    // Shutdown signal from the listener (Request::Shutdown)
    let shutdown_notify = Arc::new(Notify::new());

    let ctx = Arc::new(ListenCtx {
        supervisor: daemon.supervisor.clone(),
        health: Arc::clone(&daemon.health),
        start_time: daemon.start_time,
        monitor_interval_seconds: daemon.config.monitor_interval,
        shutdown: Arc::clone(&shutdown_notify),
    });
    tokio::spawn(Listener::new(unix_listener, ctx).run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        socket = %daemon.paths.socket_path.display(),
        "daemon ready"
    );

    // Signal ready for wrapper scripts and the CLI
    println!("READY");

    if daemon.config.auto_start_processes {
        let supervisor = daemon.supervisor.clone();
        tokio::spawn(async move {
            let results = supervisor.start_in_dependency_order().await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            info!(
                started = results.len() - failed,
                failed, "auto-start complete"
            );
        });
    }

    // NOTE: created outside the loop - tokio::select! re-evaluates branches
    // on each iteration, so an inline interval would reset every time.
    let mut tick = tokio::time::interval(daemon.config.monitor_interval());
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                daemon.supervisor.run_sample_tick().await;
                daemon.health.stamp();
            }

            _ = shutdown_notify.notified() => {
                info!("shutdown requested via command");
                break;
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    // Stop children before tearing down state
    info!("stopping supervised processes");
    daemon
        .supervisor
        .stop_all(Duration::from_secs(12))
        .await;

    daemon.shutdown()?;
    info!("daemon stopped");
    Ok(())
}

fn print_help() {
    println!("pgd {}", env!("CARGO_PKG_VERSION"));
    println!("ProcessGuard daemon - supervises long-running user processes");
    println!();
    println!("USAGE:");
    println!("    pgd");
    println!();
    println!("The daemon is typically started by the `pg` CLI and should not");
    println!("be invoked directly. It listens on a Unix socket for commands");
    println!("from `pg`.");
    println!();
    println!("ENVIRONMENT:");
    println!("    PG_STATE_DIR    State directory (default: ~/.local/state/pg)");
    println!("    PG_CONFIG       Configuration file (default: <state>/config.json)");
    println!("    PG_LOG          Log filter override (tracing env-filter syntax)");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
}

/// Maximum daemon log size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotate the daemon's own log at startup when oversized.
fn rotate_log_if_needed(log_path: &Path) {
    let Ok(meta) = std::fs::metadata(log_path) else {
        return;
    };
    if meta.len() > MAX_LOG_SIZE {
        let rotated = log_path.with_extension("log.old");
        let _ = std::fs::rename(log_path, rotated);
    }
}

/// File logging through a non-blocking writer; the guard flushes on drop.
fn setup_logging(
    paths: &Paths,
    level: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::EnvFilter;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("PG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
