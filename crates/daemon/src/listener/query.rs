// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only control-plane requests.

use std::collections::BTreeMap;

use pg_adapters::OsAdapter;
use pg_core::ProcessState;

use super::ListenCtx;
use crate::protocol::{
    DaemonStatus, PortBinding, Request, Response, SystemInfo, SystemMetrics, PROTOCOL_VERSION,
};

pub(super) async fn handle(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Status => Response::Status {
            status: DaemonStatus {
                version: PROTOCOL_VERSION.to_string(),
                pid: std::process::id(),
                uptime_seconds: ctx.start_time.elapsed().as_secs(),
                processes: ctx.supervisor.list().len(),
                healthy: ctx.health.is_healthy(),
            },
        },

        Request::Health => Response::Health {
            healthy: ctx.health.is_healthy(),
        },

        Request::ListProcesses => Response::Processes {
            processes: ctx.supervisor.list(),
        },

        Request::GetProcess { name } => match ctx.supervisor.status(&name) {
            Ok(process) => Response::Process { process },
            Err(e) => Response::from(&e),
        },

        Request::CrashStats { name } => match ctx.supervisor.crash_stats(&name) {
            Ok(stats) => Response::CrashStats { stats },
            Err(e) => Response::from(&e),
        },

        Request::TailLog {
            name,
            lines,
            stream,
        } => match ctx.supervisor.tail_log(&name, stream, lines) {
            Ok(lines) => Response::LogLines { lines },
            Err(e) => Response::from(&e),
        },

        Request::ListAlerts { active_only } => Response::Alerts {
            alerts: ctx.supervisor.alerts().list(active_only),
        },

        Request::SystemInfo => {
            let processes = ctx.supervisor.list();
            let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
            for process in &processes {
                *by_state.entry(process.state.to_string()).or_default() += 1;
            }
            Response::SystemInfo {
                info: SystemInfo {
                    version: PROTOCOL_VERSION.to_string(),
                    pid: std::process::id(),
                    uptime_seconds: ctx.start_time.elapsed().as_secs(),
                    monitor_interval_seconds: ctx.monitor_interval_seconds,
                    processes_total: processes.len(),
                    by_state,
                    active_alerts: ctx.supervisor.alerts().list(true).len(),
                },
            }
        }

        Request::SystemMetrics => {
            let host = match ctx.supervisor.os().host_metrics().await {
                Ok(host) => host,
                Err(e) => return Response::error("io_error", e.to_string()),
            };
            let connections = ctx
                .supervisor
                .os()
                .list_connections()
                .await
                .unwrap_or_default();
            let processes = ctx.supervisor.list();
            let listeners = connections
                .into_iter()
                .map(|(port, pid)| PortBinding {
                    port,
                    pid,
                    process: processes
                        .iter()
                        .find(|p| p.pid == Some(pid))
                        .map(|p| p.name.clone()),
                })
                .collect();
            Response::SystemMetrics {
                metrics: SystemMetrics { host, listeners },
            }
        }

        Request::DisabledProcesses => Response::Names {
            names: states_matching(ctx, |s| s == ProcessState::Disabled),
        },

        Request::QuarantinedProcesses => Response::Names {
            names: states_matching(ctx, |s| s == ProcessState::Quarantined),
        },

        other => Response::error("invalid_request", format!("not a query: {other:?}")),
    }
}

fn states_matching(ctx: &ListenCtx, predicate: impl Fn(ProcessState) -> bool) -> Vec<String> {
    ctx.supervisor
        .list()
        .into_iter()
        .filter(|p| predicate(p.state))
        .map(|p| p.name)
        .collect()
}
