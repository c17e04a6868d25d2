// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pg - ProcessGuard CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod daemon_process;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pg_core::ProcessConfig;
use pg_daemon::protocol::{Request, Response};
use pg_engine::LogStream;
use std::path::PathBuf;

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "pg",
    version,
    about = "ProcessGuard - supervises long-running user processes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon status and the process table
    Status,
    /// Detailed view of one process
    Show { name: String },
    /// Register a process from a JSON descriptor file
    Add { file: PathBuf },
    /// Deregister a process (kills its child if running)
    Rm { name: String },
    /// Start a process
    Start {
        name: String,
        /// Skip the dependencies-running gate
        #[arg(long)]
        ignore_dependencies: bool,
    },
    /// Stop a process (term, then kill after the graceful window)
    Stop { name: String },
    /// Restart a process
    Restart {
        name: String,
        #[arg(long)]
        ignore_dependencies: bool,
    },
    /// Clear disable/quarantine and crash history, then start
    Enable { name: String },
    /// Clear crash records and counters
    ResetCrashes { name: String },
    /// Crash history for one process
    Crashes { name: String },
    /// Recent log lines
    Logs {
        name: String,
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
        /// Read stderr instead of stdout
        #[arg(long)]
        stderr: bool,
    },
    /// Alert management
    Alerts {
        #[command(subcommand)]
        action: Option<AlertAction>,
        /// Include resolved alerts
        #[arg(long)]
        all: bool,
    },
    /// Host-level info and metrics
    System {
        #[command(subcommand)]
        what: SystemWhat,
    },
    /// Stream one metrics line per sampler tick
    Watch,
    /// Daemon management
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
enum AlertAction {
    /// Acknowledge an alert
    Ack { id: String },
    /// Resolve an alert
    Resolve { id: String },
}

#[derive(Subcommand)]
enum SystemWhat {
    /// Daemon version, uptime, process counts
    Info,
    /// Host CPU/memory and listening sockets
    Metrics,
    /// Names of disabled processes
    Disabled,
    /// Names of quarantined processes
    Quarantined,
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon in the background
    Start,
    /// Ask the daemon to shut down
    Stop,
    /// Daemon health (sampler liveness)
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status => {
            let client = DaemonClient::for_query()?;
            if let Response::Status { status } = client.request(Request::Status).await? {
                println!(
                    "pgd {} (pid {}) up {}  processes: {}  healthy: {}",
                    status.version,
                    status.pid,
                    pg_core::format_uptime(status.uptime_seconds),
                    status.processes,
                    status.healthy
                );
            }
            match client.request(Request::ListProcesses).await? {
                Response::Processes { processes } if processes.is_empty() => {
                    println!("no processes registered");
                }
                Response::Processes { processes } => {
                    print!("{}", output::process_table(&processes));
                }
                _ => bail!("unexpected response"),
            }
        }

        Commands::Show { name } => {
            let client = DaemonClient::for_query()?;
            match client.request(Request::GetProcess { name }).await? {
                Response::Process { process } => print!("{}", output::process_detail(&process)),
                _ => bail!("unexpected response"),
            }
        }

        Commands::Add { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let config: ProcessConfig = serde_json::from_str(&contents)
                .with_context(|| format!("parse {}", file.display()))?;
            let name = config.name.clone();
            let client = DaemonClient::for_action().await?;
            expect_ok(client.request(Request::AddProcess { config }).await?)?;
            println!("registered {name}");
        }

        Commands::Rm { name } => {
            let client = DaemonClient::for_query()?;
            expect_ok(
                client
                    .request(Request::RemoveProcess { name: name.clone() })
                    .await?,
            )?;
            println!("removed {name}");
        }

        Commands::Start {
            name,
            ignore_dependencies,
        } => {
            let client = DaemonClient::for_action().await?;
            expect_ok(
                client
                    .request(Request::Start {
                        name: name.clone(),
                        ignore_dependencies,
                    })
                    .await?,
            )?;
            println!("started {name}");
        }

        Commands::Stop { name } => {
            let client = DaemonClient::for_query()?;
            expect_ok(
                client
                    .request(Request::Stop { name: name.clone() })
                    .await?,
            )?;
            println!("stopping {name}");
        }

        Commands::Restart {
            name,
            ignore_dependencies,
        } => {
            let client = DaemonClient::for_query()?;
            expect_ok(
                client
                    .request(Request::Restart {
                        name: name.clone(),
                        ignore_dependencies,
                    })
                    .await?,
            )?;
            println!("restarting {name}");
        }

        Commands::Enable { name } => {
            let client = DaemonClient::for_query()?;
            expect_ok(
                client
                    .request(Request::ForceEnable { name: name.clone() })
                    .await?,
            )?;
            println!("enabled {name}");
        }

        Commands::ResetCrashes { name } => {
            let client = DaemonClient::for_query()?;
            expect_ok(
                client
                    .request(Request::ResetCrashes { name: name.clone() })
                    .await?,
            )?;
            println!("crash records cleared for {name}");
        }

        Commands::Crashes { name } => {
            let client = DaemonClient::for_query()?;
            match client.request(Request::CrashStats { name }).await? {
                Response::CrashStats { stats } => print!("{}", output::crash_stats(&stats)),
                _ => bail!("unexpected response"),
            }
        }

        Commands::Logs {
            name,
            lines,
            stderr,
        } => {
            let client = DaemonClient::for_query()?;
            let stream = if stderr {
                LogStream::Stderr
            } else {
                LogStream::Stdout
            };
            match client
                .request(Request::TailLog {
                    name,
                    lines,
                    stream,
                })
                .await?
            {
                Response::LogLines { lines } => {
                    for line in lines {
                        println!("{line}");
                    }
                }
                _ => bail!("unexpected response"),
            }
        }

        Commands::Alerts { action, all } => {
            let client = DaemonClient::for_query()?;
            match action {
                None => match client
                    .request(Request::ListAlerts { active_only: !all })
                    .await?
                {
                    Response::Alerts { alerts } => print!("{}", output::alert_list(&alerts)),
                    _ => bail!("unexpected response"),
                },
                Some(AlertAction::Ack { id }) => {
                    expect_ok(client.request(Request::AcknowledgeAlert { id }).await?)?;
                    println!("acknowledged");
                }
                Some(AlertAction::Resolve { id }) => {
                    expect_ok(client.request(Request::ResolveAlert { id }).await?)?;
                    println!("resolved");
                }
            }
        }

        Commands::System { what } => {
            let client = DaemonClient::for_query()?;
            match what {
                SystemWhat::Info => match client.request(Request::SystemInfo).await? {
                    Response::SystemInfo { info } => {
                        println!(
                            "pgd {} (pid {}) up {}",
                            info.version,
                            info.pid,
                            pg_core::format_uptime(info.uptime_seconds)
                        );
                        println!(
                            "monitor interval: {}s  processes: {}  active alerts: {}",
                            info.monitor_interval_seconds,
                            info.processes_total,
                            info.active_alerts
                        );
                        for (state, count) in info.by_state {
                            println!("  {state}: {count}");
                        }
                    }
                    _ => bail!("unexpected response"),
                },
                SystemWhat::Metrics => match client.request(Request::SystemMetrics).await? {
                    Response::SystemMetrics { metrics } => {
                        let host = metrics.host;
                        println!(
                            "cpu {:.1}%  mem {:.1}% ({} / {})  load {:.2} {:.2} {:.2}  up {}",
                            host.cpu_percent,
                            host.memory_percent,
                            host.memory_used_bytes,
                            host.memory_total_bytes,
                            host.load_average.0,
                            host.load_average.1,
                            host.load_average.2,
                            pg_core::format_uptime(host.uptime_seconds)
                        );
                        for listener in metrics.listeners {
                            let owner = listener.process.as_deref().unwrap_or("-");
                            println!(
                                "  port {:<6} pid {:<8} {}",
                                listener.port, listener.pid, owner
                            );
                        }
                    }
                    _ => bail!("unexpected response"),
                },
                SystemWhat::Disabled => print_names(Request::DisabledProcesses).await?,
                SystemWhat::Quarantined => print_names(Request::QuarantinedProcesses).await?,
            }
        }

        Commands::Watch => {
            let client = DaemonClient::for_query()?;
            println!("watching (ctrl-c to stop)");
            client
                .watch(|frame| {
                    println!("{}", output::frame_line(&frame));
                    true
                })
                .await?;
        }

        Commands::Daemon { action } => match action {
            DaemonAction::Start => {
                let socket = client::socket_path()?;
                if socket.exists() {
                    let probe = DaemonClient::for_query()?;
                    if probe.request(Request::Ping).await.is_ok() {
                        println!("daemon already running");
                        return Ok(());
                    }
                    // Stale socket from a dead daemon
                    let _ = std::fs::remove_file(&socket);
                }
                daemon_process::start_background(&socket, client::timeout_connect()).await?;
                println!("daemon started");
            }
            DaemonAction::Stop => {
                let client = DaemonClient::for_query()?;
                match client.request(Request::Shutdown).await? {
                    Response::ShuttingDown => println!("daemon shutting down"),
                    _ => bail!("unexpected response"),
                }
            }
            DaemonAction::Health => {
                let client = DaemonClient::for_query()?;
                match client.request(Request::Health).await? {
                    Response::Health { healthy: true } => println!("healthy"),
                    Response::Health { healthy: false } => {
                        println!("unhealthy: sampler has not ticked recently");
                        std::process::exit(1);
                    }
                    _ => bail!("unexpected response"),
                }
            }
        },
    }
    Ok(())
}

async fn print_names(request: Request) -> Result<()> {
    let client = DaemonClient::for_query()?;
    match client.request(request).await? {
        Response::Names { names } if names.is_empty() => println!("none"),
        Response::Names { names } => {
            for name in names {
                println!("{name}");
            }
        }
        _ => bail!("unexpected response"),
    }
    Ok(())
}

fn expect_ok(response: Response) -> Result<()> {
    match response {
        Response::Ok => Ok(()),
        other => bail!("unexpected response: {other:?}"),
    }
}
