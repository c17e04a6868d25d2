// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervisor: registration, lifecycle commands, and the sampler
//! tick.
//!
//! `Supervisor` is the engine's public face. It owns the process registry
//! and hands each registered process to a dedicated worker task (see
//! `worker`); commands are forwarded into worker mailboxes and awaited via
//! oneshot replies, so callers never mutate process state directly.

mod registry;
mod worker;

use crate::alerts::AlertBus;
use crate::error::SupervisorError;
use crate::logs::{LogManager, LogStream};
use crate::sampler::MetricsFrame;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use pg_adapters::{OsAdapter, SampleError};
use pg_core::{Clock, ConfigError, MetricSample, ProcessConfig, ProcessState};
use registry::{Entry, InstanceState, Registry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use worker::{ProcessMsg, Reply, WorkerCtx};

/// Flags accepted by start/restart requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Skip the dependencies-running gate.
    pub ignore_dependencies: bool,
}

/// Engine tuning knobs shared by all processes.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Samples retained per process (default one hour at 10s ticks).
    pub ring_capacity: usize,
    /// Rolling-mean window for threshold checks.
    pub sample_window: usize,
    /// Starting -> Running fallback when no sample arrives.
    pub start_grace: Duration,
    /// Term -> Kill escalation window during stops.
    pub graceful_shutdown: Duration,
    /// Uptime that resets the consecutive-restart counter.
    pub stable_uptime: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 360,
            sample_window: 6,
            start_grace: Duration::from_secs(1),
            graceful_shutdown: Duration::from_secs(10),
            stable_uptime: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of one process for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub state: ProcessState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<f64>,
    pub restarts_total: u32,
    pub consecutive_restarts: u32,
    pub crashes_in_window: u32,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_remaining_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sample: Option<MetricSample>,
    pub depends_on: Vec<String>,
}

/// One crash for crash-stats queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashEntry {
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    pub run_seconds: f64,
}

/// Crash accounting for one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashStats {
    pub process: String,
    pub max_crashes: u32,
    pub window_seconds: u64,
    pub action: String,
    pub crashes: Vec<CrashEntry>,
    pub consecutive_restarts: u32,
    pub restarts_total: u32,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine_remaining_seconds: Option<u64>,
}

/// The supervisor core: registry + per-process workers + sampler tick.
pub struct Supervisor<O: OsAdapter, C: Clock> {
    os: O,
    clock: C,
    alerts: Arc<AlertBus<C>>,
    logs: Arc<LogManager>,
    settings: Arc<SupervisorConfig>,
    registry: Arc<RwLock<Registry>>,
    frames: broadcast::Sender<MetricsFrame>,
}

impl<O: OsAdapter, C: Clock> Clone for Supervisor<O, C> {
    fn clone(&self) -> Self {
        Self {
            os: self.os.clone(),
            clock: self.clock.clone(),
            alerts: Arc::clone(&self.alerts),
            logs: Arc::clone(&self.logs),
            settings: Arc::clone(&self.settings),
            registry: Arc::clone(&self.registry),
            frames: self.frames.clone(),
        }
    }
}

impl<O: OsAdapter, C: Clock> Supervisor<O, C> {
    pub fn new(
        os: O,
        clock: C,
        alerts: Arc<AlertBus<C>>,
        logs: Arc<LogManager>,
        settings: SupervisorConfig,
    ) -> Self {
        let (frames, _) = broadcast::channel(16);
        Self {
            os,
            clock,
            alerts,
            logs,
            settings: Arc::new(settings),
            registry: Arc::new(RwLock::new(Registry::new())),
            frames,
        }
    }

    pub fn alerts(&self) -> &Arc<AlertBus<C>> {
        &self.alerts
    }

    /// The underlying OS facade, for host-level queries the control plane
    /// serves directly (host metrics, listening sockets).
    pub fn os(&self) -> &O {
        &self.os
    }

    /// Register a process and spawn its worker.
    ///
    /// Dependencies must already be registered; a dependency cycle fails
    /// registration and leaves the registry unchanged.
    pub fn register(&self, config: ProcessConfig) -> Result<(), SupervisorError> {
        config.validate()?;
        let mut registry = self.registry.write();
        if registry.entries.contains_key(&config.name) {
            return Err(ConfigError::DuplicateName(config.name.clone()).into());
        }
        for dep in &config.depends_on {
            if !registry.entries.contains_key(dep.as_str()) {
                return Err(ConfigError::UnknownDependency {
                    process: config.name.clone(),
                    dependency: dep.clone(),
                }
                .into());
            }
        }
        registry.graph.insert(&config.name, &config.depends_on)?;

        let shared = Arc::new(Mutex::new(InstanceState::new(self.settings.ring_capacity)));
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = WorkerCtx {
            name: config.name.clone(),
            config: config.clone(),
            shared: Arc::clone(&shared),
            registry: Arc::clone(&self.registry),
            os: self.os.clone(),
            clock: self.clock.clone(),
            alerts: Arc::clone(&self.alerts),
            logs: Arc::clone(&self.logs),
            settings: Arc::clone(&self.settings),
            self_tx: tx.clone(),
        };
        tokio::spawn(worker::run(ctx, rx));
        tracing::info!(process = %config.name, "process registered");
        registry.entries.insert(
            config.name.clone(),
            Entry {
                config,
                shared,
                mailbox: tx,
            },
        );
        Ok(())
    }

    /// Remove a process. Its worker kills any running child on the way out.
    pub fn deregister(&self, name: &str) -> Result<(), SupervisorError> {
        let entry = {
            let mut registry = self.registry.write();
            let dependents = registry.graph.dependents(name);
            if !dependents.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{name} is required by {}",
                    dependents.join(", ")
                ))
                .into());
            }
            let entry = registry
                .entries
                .shift_remove(name)
                .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
            registry.graph.remove(name);
            entry
        };
        let _ = entry.mailbox.send(ProcessMsg::Shutdown);
        tracing::info!(process = %name, "process deregistered");
        Ok(())
    }

    async fn command(
        &self,
        name: &str,
        make: impl FnOnce(Reply) -> ProcessMsg,
    ) -> Result<(), SupervisorError> {
        let mailbox = self
            .registry
            .read()
            .entries
            .get(name)
            .map(|e| e.mailbox.clone())
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        let (tx, rx) = oneshot::channel();
        mailbox
            .send(make(tx))
            .map_err(|_| SupervisorError::Unavailable(name.to_string()))?;
        rx.await
            .map_err(|_| SupervisorError::Unavailable(name.to_string()))?
    }

    pub async fn start(&self, name: &str, opts: StartOptions) -> Result<(), SupervisorError> {
        self.command(name, |reply| ProcessMsg::Start {
            opts,
            reply: Some(reply),
        })
        .await
    }

    pub async fn stop(&self, name: &str) -> Result<(), SupervisorError> {
        self.command(name, |reply| ProcessMsg::Stop {
            reply: Some(reply),
            cascade_from: None,
        })
        .await
    }

    pub async fn restart(&self, name: &str, opts: StartOptions) -> Result<(), SupervisorError> {
        self.command(name, |reply| ProcessMsg::Restart {
            opts,
            reply: Some(reply),
        })
        .await
    }

    /// Clear disable/quarantine and crash history, then start.
    pub async fn force_enable(&self, name: &str) -> Result<(), SupervisorError> {
        self.command(name, |reply| ProcessMsg::ForceEnable { reply: Some(reply) })
            .await
    }

    /// Clear crash records and counters only.
    pub async fn reset_crashes(&self, name: &str) -> Result<(), SupervisorError> {
        self.command(name, |reply| ProcessMsg::ResetCrashes { reply: Some(reply) })
            .await
    }

    pub fn status(&self, name: &str) -> Result<ProcessStatus, SupervisorError> {
        let registry = self.registry.read();
        let entry = registry
            .entries
            .get(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        Ok(self.status_of(name, entry))
    }

    /// All processes in registration order.
    pub fn list(&self) -> Vec<ProcessStatus> {
        let registry = self.registry.read();
        registry
            .entries
            .iter()
            .map(|(name, entry)| self.status_of(name, entry))
            .collect()
    }

    pub fn config_of(&self, name: &str) -> Result<ProcessConfig, SupervisorError> {
        let registry = self.registry.read();
        registry
            .entries
            .get(name)
            .map(|e| e.config.clone())
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    pub fn crash_stats(&self, name: &str) -> Result<CrashStats, SupervisorError> {
        let now = self.clock.now();
        let registry = self.registry.read();
        let entry = registry
            .entries
            .get(name)
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
        let shared = entry.shared.lock();
        let window = entry.config.crash.window();
        let crashes = shared
            .crashes
            .records()
            .iter()
            .filter(|r| match window {
                Some(w) => now.duration_since(r.at) <= w,
                None => true,
            })
            .map(|r| CrashEntry {
                at: r.wall,
                exit_code: r.exit_code,
                run_seconds: r.run_duration.as_secs_f64(),
            })
            .collect();
        Ok(CrashStats {
            process: name.to_string(),
            max_crashes: entry.config.crash.max_crashes,
            window_seconds: entry.config.crash.window_seconds,
            action: entry.config.crash.action.to_string(),
            crashes,
            consecutive_restarts: shared.crashes.consecutive_restarts(),
            restarts_total: shared.restarts_total,
            disabled: shared.disabled,
            quarantine_remaining_seconds: shared
                .quarantine_until
                .and_then(|until| (until > now).then(|| until.duration_since(now).as_secs())),
        })
    }

    pub fn tail_log(
        &self,
        name: &str,
        stream: LogStream,
        lines: usize,
    ) -> Result<Vec<String>, SupervisorError> {
        let override_path = {
            let registry = self.registry.read();
            let entry = registry
                .entries
                .get(name)
                .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
            entry.config.log_file.clone()
        };
        let result = match (stream, override_path) {
            (LogStream::Stdout, Some(path)) => self.logs.tail_at(&path, lines),
            _ => self.logs.tail(name, stream, lines),
        };
        result.map_err(|e| SupervisorError::Log(e.to_string()))
    }

    /// One sampler pass: sample every instance that owns a PID, fan the
    /// samples into worker mailboxes, and publish a metrics frame.
    pub async fn run_sample_tick(&self) -> MetricsFrame {
        let now = self.clock.now();
        let targets: Vec<(String, u32, f64, mpsc::UnboundedSender<ProcessMsg>)> = {
            let registry = self.registry.read();
            registry
                .entries
                .iter()
                .filter_map(|(name, entry)| {
                    let shared = entry.shared.lock();
                    if !shared.state.has_pid() {
                        return None;
                    }
                    let pid = shared.pid?;
                    let uptime = shared
                        .started_at
                        .map(|t| now.duration_since(t).as_secs_f64())
                        .unwrap_or(0.0);
                    Some((name.clone(), pid, uptime, entry.mailbox.clone()))
                })
                .collect()
        };

        let mut processes = BTreeMap::new();
        for (name, pid, uptime, mailbox) in targets {
            match self.os.sample(pid).await {
                Ok(mut sample) => {
                    sample.uptime_seconds = uptime;
                    processes.insert(name, sample.clone());
                    let _ = mailbox.send(ProcessMsg::Sample(sample));
                }
                Err(SampleError::NotFound(_)) => {
                    tracing::warn!(process = %name, pid, "process disappeared between ticks");
                    let _ = mailbox.send(ProcessMsg::Disappeared { pid });
                }
                Err(e) => {
                    tracing::warn!(process = %name, pid, error = %e, "sampling failed");
                }
            }
        }

        let system = match self.os.host_metrics().await {
            Ok(host) => Some(host),
            Err(e) => {
                tracing::warn!(error = %e, "host metrics unavailable");
                None
            }
        };

        let frame = MetricsFrame {
            timestamp: self.clock.wall_now(),
            system,
            processes,
            alerts: self.alerts.list(true),
        };
        let _ = self.frames.send(frame.clone());
        frame
    }

    /// Live feed of sampler frames for metric-stream subscribers.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<MetricsFrame> {
        self.frames.subscribe()
    }

    /// Start every process in dependency order, waiting for each to leave
    /// `Starting` before its dependents are attempted.
    pub async fn start_in_dependency_order(&self) -> Vec<(String, Result<(), SupervisorError>)> {
        let order = self.registry.read().graph.topo_order();
        let mut results = Vec::with_capacity(order.len());
        for name in order {
            let result = self.start(&name, StartOptions::default()).await;
            match &result {
                Ok(()) => self.wait_past_starting(&name).await,
                Err(e) => {
                    tracing::warn!(process = %name, error = %e, "auto-start failed");
                }
            }
            results.push((name, result));
        }
        results
    }

    async fn wait_past_starting(&self, name: &str) {
        let deadline = self.settings.start_grace * 2 + Duration::from_millis(500);
        let poll = Duration::from_millis(25);
        let mut waited = Duration::ZERO;
        while waited < deadline {
            match self.status(name) {
                Ok(status) if status.state == ProcessState::Starting => {
                    tokio::time::sleep(poll).await;
                    waited += poll;
                }
                _ => return,
            }
        }
    }

    /// Ask every process to stop and wait (bounded) for children to exit.
    /// Used by daemon shutdown.
    pub async fn stop_all(&self, wait: Duration) {
        let mailboxes: Vec<mpsc::UnboundedSender<ProcessMsg>> = {
            let registry = self.registry.read();
            registry
                .entries
                .values()
                .map(|e| e.mailbox.clone())
                .collect()
        };
        for mailbox in &mailboxes {
            let _ = mailbox.send(ProcessMsg::Stop {
                reply: None,
                cascade_from: None,
            });
        }

        let poll = Duration::from_millis(50);
        let mut waited = Duration::ZERO;
        while waited < wait {
            let any_alive = {
                let registry = self.registry.read();
                registry
                    .entries
                    .values()
                    .any(|e| e.shared.lock().state.has_pid())
            };
            if !any_alive {
                return;
            }
            tokio::time::sleep(poll).await;
            waited += poll;
        }
        tracing::warn!("some processes still alive after shutdown wait");
    }

    fn status_of(&self, name: &str, entry: &Entry) -> ProcessStatus {
        let now = self.clock.now();
        let shared = entry.shared.lock();
        ProcessStatus {
            name: name.to_string(),
            kind: entry.config.kind.clone(),
            state: shared.state,
            pid: shared.pid,
            started_at: shared.started_wall,
            uptime_seconds: match (shared.state.has_pid(), shared.started_at) {
                (true, Some(t)) => Some(now.duration_since(t).as_secs_f64()),
                _ => None,
            },
            restarts_total: shared.restarts_total,
            consecutive_restarts: shared.crashes.consecutive_restarts(),
            crashes_in_window: shared.crashes.crashes_in_window(&entry.config, now) as u32,
            disabled: shared.disabled,
            quarantine_remaining_seconds: shared
                .quarantine_until
                .and_then(|until| (until > now).then(|| until.duration_since(now).as_secs())),
            last_sample: shared.ring.latest().cloned(),
            depends_on: entry.config.depends_on.clone(),
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
