// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process worker: the lifecycle state machine.
//!
//! One worker task owns each process. Its mailbox serializes every state
//! transition: control commands, child exits, samples, and timer firings
//! are handled strictly in arrival order, so no transition ever races
//! another for the same process. Cross-process effects (cascade shutdown)
//! are delivered as messages to the victims' mailboxes, never as calls.

use super::registry::{InstanceState, Registry};
use super::{StartOptions, SupervisorConfig};
use crate::alerts::AlertBus;
use crate::crash::CrashDecision;
use crate::error::SupervisorError;
use crate::logs::LogManager;
use crate::sampler::Crossing;
use parking_lot::{Mutex, RwLock};
use pg_adapters::{Child, OsAdapter, SignalKind, SpawnRequest};
use pg_core::{AlertKind, AlertSeverity, Clock, MetricSample, ProcessConfig, ProcessState};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub(crate) type Reply = oneshot::Sender<Result<(), SupervisorError>>;

/// Mailbox messages for one process worker.
pub(crate) enum ProcessMsg {
    Start {
        opts: StartOptions,
        reply: Option<Reply>,
    },
    Stop {
        reply: Option<Reply>,
        /// Set when this stop is a cascade from a disabled dependency.
        cascade_from: Option<String>,
    },
    Restart {
        opts: StartOptions,
        reply: Option<Reply>,
    },
    ForceEnable {
        reply: Option<Reply>,
    },
    ResetCrashes {
        reply: Option<Reply>,
    },
    /// Sampler tick result for this process.
    Sample(MetricSample),
    /// Sampler saw the PID vanish without a reaped exit yet.
    Disappeared { pid: u32 },
    /// Reaper task observed the child exit.
    ChildExited {
        pid: u32,
        exit_code: Option<i32>,
    },
    Timer {
        kind: TimerKind,
        generation: u64,
    },
    /// Deregistration: stop processing; the run loop kills any child.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Starting -> Running fallback when no sample arrives.
    StartGrace,
    /// Deferred automatic restart.
    RestartDelay,
    /// Escalate term to kill during a stop.
    KillAfterGrace,
}

pub(crate) struct WorkerCtx<O: OsAdapter, C: Clock> {
    pub name: String,
    pub config: ProcessConfig,
    pub shared: Arc<Mutex<InstanceState>>,
    pub registry: Arc<RwLock<Registry>>,
    pub os: O,
    pub clock: C,
    pub alerts: Arc<AlertBus<C>>,
    pub logs: Arc<LogManager>,
    pub settings: Arc<SupervisorConfig>,
    pub self_tx: mpsc::UnboundedSender<ProcessMsg>,
}

pub(crate) async fn run<O: OsAdapter, C: Clock>(
    ctx: WorkerCtx<O, C>,
    mut rx: mpsc::UnboundedReceiver<ProcessMsg>,
) {
    let mut worker = Worker {
        ctx,
        generation: 0,
        expecting_exit: false,
        pending_restart: None,
    };
    while let Some(msg) = rx.recv().await {
        if !worker.handle(msg).await {
            break;
        }
    }
    worker.kill_abandoned_child().await;
}

struct Worker<O: OsAdapter, C: Clock> {
    ctx: WorkerCtx<O, C>,
    /// Bumped whenever outstanding timers become stale; timer messages
    /// carry the generation they were scheduled under.
    generation: u64,
    /// A commanded stop is in flight; the next reaped exit is not a crash.
    expecting_exit: bool,
    /// Restart waiting for the stop half to finish.
    pending_restart: Option<StartOptions>,
}

fn respond(reply: Option<Reply>, result: Result<(), SupervisorError>) {
    match reply {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => {
            if let Err(e) = result {
                tracing::debug!(error = %e, "unattended command failed");
            }
        }
    }
}

impl<O: OsAdapter, C: Clock> Worker<O, C> {
    /// Returns false when the worker should exit its loop.
    async fn handle(&mut self, msg: ProcessMsg) -> bool {
        match msg {
            ProcessMsg::Start { opts, reply } => {
                let result = self.handle_start(opts).await;
                respond(reply, result);
            }
            ProcessMsg::Stop {
                reply,
                cascade_from,
            } => {
                let result = self.handle_stop(cascade_from).await;
                respond(reply, result);
            }
            ProcessMsg::Restart { opts, reply } => {
                let result = self.handle_restart(opts).await;
                respond(reply, result);
            }
            ProcessMsg::ForceEnable { reply } => {
                let result = self.handle_force_enable().await;
                respond(reply, result);
            }
            ProcessMsg::ResetCrashes { reply } => {
                self.ctx.shared.lock().crashes.reset();
                tracing::info!(process = %self.ctx.name, "crash records reset");
                respond(reply, Ok(()));
            }
            ProcessMsg::Sample(sample) => self.handle_sample(sample),
            ProcessMsg::Disappeared { pid } => {
                self.handle_child_exited(pid, None, true).await;
            }
            ProcessMsg::ChildExited { pid, exit_code } => {
                self.handle_child_exited(pid, exit_code, false).await;
            }
            ProcessMsg::Timer { kind, generation } => {
                self.handle_timer(kind, generation).await;
            }
            ProcessMsg::Shutdown => return false,
        }
        true
    }

    async fn handle_start(&mut self, opts: StartOptions) -> Result<(), SupervisorError> {
        let name = self.ctx.name.clone();
        let now = self.ctx.clock.now();

        {
            let mut shared = self.ctx.shared.lock();
            if shared.state.has_pid() {
                return Err(SupervisorError::AlreadyRunning(name));
            }
            if shared.disabled {
                return Err(SupervisorError::Disabled(name));
            }
            if let Some(until) = shared.quarantine_until {
                if until > now {
                    return Err(SupervisorError::Quarantined {
                        process: name,
                        remaining_seconds: until.duration_since(now).as_secs().max(1),
                    });
                }
                // Expired; self-clears on this start attempt
                shared.quarantine_until = None;
            }
        }

        if !opts.ignore_dependencies {
            let missing = self.ctx.registry.read().unready_dependencies(&name);
            if !missing.is_empty() {
                return Err(SupervisorError::DependencyNotReady {
                    process: name,
                    missing,
                });
            }
        }

        let (stdout, stderr) = self
            .ctx
            .logs
            .open_pair(&name, self.ctx.config.log_file.as_deref())
            .map_err(|e| SupervisorError::Log(e.to_string()))?;

        let cwd = self
            .ctx
            .config
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let request = SpawnRequest {
            command: self.ctx.config.command.clone(),
            cwd,
            env: self.ctx.config.env.clone(),
            stdout,
            stderr,
        };

        self.generation += 1;
        let generation = self.generation;

        match self.ctx.os.spawn(request).await {
            Ok(child) => {
                let pid = child.pid;
                {
                    let mut shared = self.ctx.shared.lock();
                    shared.state = ProcessState::Starting;
                    shared.pid = Some(pid);
                    shared.pgid = Some(child.pgid);
                    shared.started_at = Some(self.ctx.clock.now());
                    shared.started_wall = Some(self.ctx.clock.wall_now());
                    if shared.has_run {
                        shared.restarts_total += 1;
                    }
                    shared.has_run = true;
                    shared.ring.clear();
                    shared.cpu_watch.reset();
                    shared.memory_watch.reset();
                }
                self.expecting_exit = false;
                self.spawn_reaper(child);
                self.schedule(TimerKind::StartGrace, generation, self.ctx.settings.start_grace);
                tracing::info!(process = %name, pid, "process starting");
                Ok(())
            }
            Err(e) => {
                {
                    let mut shared = self.ctx.shared.lock();
                    shared.state = ProcessState::Failed;
                    shared.pid = None;
                    shared.pgid = None;
                }
                let mut metadata = serde_json::Map::new();
                metadata.insert("error".to_string(), json!(e.to_string()));
                self.ctx.alerts.publish(
                    AlertKind::ProcessCrashed,
                    AlertSeverity::Critical,
                    Some(&name),
                    format!("failed to spawn: {e}"),
                    metadata,
                );
                tracing::error!(process = %name, error = %e, "spawn failed");
                Err(SupervisorError::Spawn {
                    process: name,
                    source: e,
                })
            }
        }
    }

    async fn handle_stop(
        &mut self,
        cascade_from: Option<String>,
    ) -> Result<(), SupervisorError> {
        // A restart waiting behind a stop is void either way
        self.pending_restart = None;

        let (state, pgid) = {
            let shared = self.ctx.shared.lock();
            (shared.state, shared.pgid)
        };

        match state {
            ProcessState::Starting | ProcessState::Running => {
                // Void the grace/restart timers of the current run
                self.generation += 1;
                self.ctx.shared.lock().state = ProcessState::Stopping;
                self.expecting_exit = true;
                if let Some(pgid) = pgid {
                    if let Err(e) = self.ctx.os.signal(pgid, SignalKind::Term).await {
                        tracing::warn!(process = %self.ctx.name, error = %e, "term signal failed");
                    }
                }
                self.schedule(
                    TimerKind::KillAfterGrace,
                    self.generation,
                    self.ctx.settings.graceful_shutdown,
                );
                match cascade_from {
                    Some(origin) => tracing::info!(
                        process = %self.ctx.name,
                        origin = %origin,
                        "stopping (cascade)"
                    ),
                    None => tracing::info!(process = %self.ctx.name, "stopping"),
                }
                Ok(())
            }
            // Already on its way down; the kill timer stays armed
            ProcessState::Stopping => Ok(()),
            ProcessState::Failed => {
                // Cancels the pending auto-restart; the process stays down
                self.generation += 1;
                let mut shared = self.ctx.shared.lock();
                shared.state = ProcessState::Stopped;
                shared.pid = None;
                shared.pgid = None;
                Ok(())
            }
            // Idempotent on already-down states
            ProcessState::Stopped | ProcessState::Disabled | ProcessState::Quarantined => Ok(()),
        }
    }

    async fn handle_restart(&mut self, opts: StartOptions) -> Result<(), SupervisorError> {
        let has_pid = self.ctx.shared.lock().state.has_pid();
        if has_pid {
            self.handle_stop(None).await?;
            self.pending_restart = Some(opts);
            Ok(())
        } else {
            self.handle_start(opts).await
        }
    }

    async fn handle_force_enable(&mut self) -> Result<(), SupervisorError> {
        let has_pid = {
            let mut shared = self.ctx.shared.lock();
            shared.disabled = false;
            shared.quarantine_until = None;
            shared.crashes.reset();
            let has_pid = shared.state.has_pid();
            if !has_pid {
                shared.state = ProcessState::Stopped;
            }
            has_pid
        };
        tracing::info!(process = %self.ctx.name, "force-enabled");
        if has_pid {
            return Ok(());
        }
        self.generation += 1;
        self.pending_restart = None;
        self.handle_start(StartOptions::default()).await
    }

    fn handle_sample(&mut self, sample: MetricSample) {
        let config = &self.ctx.config;
        let mut crossings: Vec<(Crossing, &'static str, f64, f64)> = Vec::new();
        let became_running;
        {
            let mut shared = self.ctx.shared.lock();
            if !shared.state.has_pid() {
                // Raced with an exit; drop the stale sample
                return;
            }
            became_running = shared.state == ProcessState::Starting;
            if became_running {
                shared.state = ProcessState::Running;
            }

            let uptime = Duration::from_secs_f64(sample.uptime_seconds.max(0.0));
            shared
                .crashes
                .note_stable_uptime(uptime, self.ctx.settings.stable_uptime);
            shared.ring.push(sample);

            let window = self.ctx.settings.sample_window;
            if let Some(mean) = shared.ring.rolling_mean(window, |s| s.cpu_percent) {
                if let Some(crossing) = shared
                    .cpu_watch
                    .observe(mean, config.cpu_threshold_percent)
                {
                    crossings.push((crossing, "cpu", mean, config.cpu_threshold_percent));
                }
            }
            if let Some(mean) = shared.ring.rolling_mean(window, |s| s.memory_percent) {
                if let Some(crossing) = shared
                    .memory_watch
                    .observe(mean, config.memory_threshold_percent)
                {
                    crossings.push((crossing, "memory", mean, config.memory_threshold_percent));
                }
            }
        }

        if became_running {
            tracing::info!(process = %self.ctx.name, "process running (first sample)");
        }

        for (crossing, metric, mean, threshold) in crossings {
            let mut metadata = serde_json::Map::new();
            metadata.insert("metric".to_string(), json!(metric));
            metadata.insert("rolling_mean".to_string(), json!(mean));
            metadata.insert("threshold".to_string(), json!(threshold));
            match crossing {
                Crossing::Raised => {
                    let kind = if metric == "cpu" {
                        AlertKind::CpuHigh
                    } else {
                        AlertKind::MemoryHigh
                    };
                    self.ctx.alerts.publish(
                        kind,
                        AlertSeverity::Warning,
                        Some(&self.ctx.name),
                        format!("{metric} at {mean:.1}% (threshold {threshold:.1}%)"),
                        metadata,
                    );
                }
                Crossing::Cleared => {
                    self.ctx.alerts.publish(
                        AlertKind::ThresholdCleared,
                        AlertSeverity::Info,
                        Some(&self.ctx.name),
                        format!("{metric} back at {mean:.1}% (threshold {threshold:.1}%)"),
                        metadata,
                    );
                }
            }
        }
    }

    async fn handle_child_exited(
        &mut self,
        pid: u32,
        exit_code: Option<i32>,
        disappeared: bool,
    ) {
        let name = self.ctx.name.clone();
        let now = self.ctx.clock.now();
        let wall = self.ctx.clock.wall_now();

        let run_duration = {
            let mut shared = self.ctx.shared.lock();
            if shared.pid != Some(pid) {
                // Stale event from a previous run
                return;
            }
            shared.pid = None;
            shared.pgid = None;
            shared
                .started_at
                .map(|t| now.duration_since(t))
                .unwrap_or_default()
        };

        if self.expecting_exit {
            self.expecting_exit = false;
            self.generation += 1; // cancel the kill-after-grace timer
            self.ctx.shared.lock().state = ProcessState::Stopped;
            tracing::info!(process = %name, ?exit_code, "process stopped");
            if let Some(opts) = self.pending_restart.take() {
                if let Err(e) = self.handle_start(opts).await {
                    tracing::warn!(process = %name, error = %e, "restart failed after stop");
                }
            }
            return;
        }

        // Unexpected exit: consult the crash engine
        let (decision, quarantined_now, crash_count) = {
            let mut shared = self.ctx.shared.lock();
            let quarantined = shared
                .quarantine_until
                .map(|until| until > now)
                .unwrap_or(false);
            let disabled = shared.disabled;
            let decision = shared.crashes.on_exit(
                &self.ctx.config,
                disabled,
                quarantined,
                now,
                wall,
                exit_code,
                run_duration,
            );
            let count = shared.crashes.crashes_in_window(&self.ctx.config, now);
            (decision, quarantined, count)
        };

        tracing::warn!(
            process = %name,
            ?exit_code,
            run_seconds = run_duration.as_secs_f64(),
            disappeared,
            decision = decision.name(),
            "process exited unexpectedly"
        );

        let mut metadata = serde_json::Map::new();
        metadata.insert("exit_code".to_string(), json!(exit_code));
        metadata.insert(
            "run_seconds".to_string(),
            json!(run_duration.as_secs_f64()),
        );
        metadata.insert("decision".to_string(), json!(decision.name()));
        metadata.insert("crashes_in_window".to_string(), json!(crash_count));
        let described = match exit_code {
            Some(code) => format!("exited unexpectedly with code {code}"),
            None => "killed by signal".to_string(),
        };
        self.ctx.alerts.publish(
            AlertKind::ProcessCrashed,
            AlertSeverity::Warning,
            Some(&name),
            described,
            metadata,
        );

        match decision {
            CrashDecision::Hold => {
                let mut shared = self.ctx.shared.lock();
                shared.state = if shared.disabled {
                    ProcessState::Disabled
                } else if quarantined_now {
                    ProcessState::Quarantined
                } else {
                    ProcessState::Failed
                };
            }
            CrashDecision::RestartAfter(delay) => {
                self.ctx.shared.lock().state = ProcessState::Failed;
                self.schedule(TimerKind::RestartDelay, self.generation, delay);
                tracing::info!(
                    process = %name,
                    delay_ms = delay.as_millis() as u64,
                    "restart scheduled"
                );
            }
            CrashDecision::Disable { reason } => {
                {
                    let mut shared = self.ctx.shared.lock();
                    shared.disabled = true;
                    shared.state = ProcessState::Disabled;
                    shared.ring.clear();
                }
                let mut metadata = serde_json::Map::new();
                metadata.insert("reason".to_string(), json!(reason.to_string()));
                metadata.insert("crashes_in_window".to_string(), json!(crash_count));
                self.ctx.alerts.publish(
                    AlertKind::ProcessDisabled,
                    AlertSeverity::Critical,
                    Some(&name),
                    format!("disabled after repeated crashes ({reason})"),
                    metadata,
                );
            }
            CrashDecision::Quarantine { until } => {
                {
                    let mut shared = self.ctx.shared.lock();
                    shared.quarantine_until = Some(until);
                    shared.state = ProcessState::Quarantined;
                }
                let seconds = self.ctx.config.crash.quarantine_seconds;
                let mut metadata = serde_json::Map::new();
                metadata.insert("quarantine_seconds".to_string(), json!(seconds));
                self.ctx.alerts.publish(
                    AlertKind::Quarantined,
                    AlertSeverity::Warning,
                    Some(&name),
                    format!("quarantined for {seconds}s after repeated crashes"),
                    metadata,
                );
            }
            CrashDecision::KillDependents => {
                // The origin must be Disabled before any victim is asked to stop
                {
                    let mut shared = self.ctx.shared.lock();
                    shared.disabled = true;
                    shared.state = ProcessState::Disabled;
                    shared.ring.clear();
                }
                let mut metadata = serde_json::Map::new();
                metadata.insert("reason".to_string(), json!("crash_window"));
                metadata.insert("action".to_string(), json!("kill_dependencies"));
                metadata.insert("crashes_in_window".to_string(), json!(crash_count));
                self.ctx.alerts.publish(
                    AlertKind::ProcessDisabled,
                    AlertSeverity::Critical,
                    Some(&name),
                    "disabled after repeated crashes; stopping dependents",
                    metadata,
                );

                let victims: Vec<(String, mpsc::UnboundedSender<ProcessMsg>)> = {
                    let registry = self.ctx.registry.read();
                    registry
                        .graph
                        .dependents_closure(&name)
                        .into_iter()
                        .filter_map(|victim| {
                            registry
                                .entries
                                .get(&victim)
                                .map(|entry| (victim, entry.mailbox.clone()))
                        })
                        .collect()
                };
                for (victim, mailbox) in victims {
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("origin".to_string(), json!(name.clone()));
                    self.ctx.alerts.publish(
                        AlertKind::DependencyKilled,
                        AlertSeverity::Warning,
                        Some(&victim),
                        format!("stopped because dependency {name} was disabled"),
                        metadata,
                    );
                    let _ = mailbox.send(ProcessMsg::Stop {
                        reply: None,
                        cascade_from: Some(name.clone()),
                    });
                }
            }
        }
    }

    async fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        if generation != self.generation {
            return; // stale
        }
        match kind {
            TimerKind::StartGrace => {
                let mut shared = self.ctx.shared.lock();
                if shared.state == ProcessState::Starting {
                    shared.state = ProcessState::Running;
                    tracing::info!(process = %self.ctx.name, "process running (grace elapsed)");
                }
            }
            TimerKind::RestartDelay => {
                let state = self.ctx.shared.lock().state;
                if state == ProcessState::Failed {
                    if let Err(e) = self.handle_start(StartOptions::default()).await {
                        tracing::warn!(
                            process = %self.ctx.name,
                            error = %e,
                            "scheduled restart failed"
                        );
                    }
                }
            }
            TimerKind::KillAfterGrace => {
                let (state, pgid) = {
                    let shared = self.ctx.shared.lock();
                    (shared.state, shared.pgid)
                };
                if state == ProcessState::Stopping {
                    if let Some(pgid) = pgid {
                        tracing::warn!(
                            process = %self.ctx.name,
                            "graceful window elapsed, killing process group"
                        );
                        if let Err(e) = self.ctx.os.signal(pgid, SignalKind::Kill).await {
                            tracing::warn!(process = %self.ctx.name, error = %e, "kill failed");
                        }
                    }
                }
            }
        }
    }

    fn spawn_reaper(&self, child: Child) {
        let os = self.ctx.os.clone();
        let tx = self.ctx.self_tx.clone();
        let pid = child.pid;
        tokio::spawn(async move {
            let exit_code = os.wait_exit(child).await.unwrap_or(None);
            let _ = tx.send(ProcessMsg::ChildExited { pid, exit_code });
        });
    }

    fn schedule(&self, kind: TimerKind, generation: u64, delay: Duration) {
        let tx = self.ctx.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ProcessMsg::Timer { kind, generation });
        });
    }

    /// Deregistration leaves no orphans behind.
    async fn kill_abandoned_child(&self) {
        let pgid = self.ctx.shared.lock().pgid;
        if let Some(pgid) = pgid {
            tracing::info!(process = %self.ctx.name, "killing child on deregistration");
            let _ = self.ctx.os.signal(pgid, SignalKind::Kill).await;
        }
    }
}
