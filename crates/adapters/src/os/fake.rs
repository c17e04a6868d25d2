// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake OS adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    Child, ChildInner, OsAdapter, OsError, SampleError, SignalKind, SpawnError, SpawnRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pg_core::{HostMetrics, MetricSample};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Recorded spawn call.
#[derive(Debug, Clone)]
pub struct SpawnedProcess {
    pub pid: u32,
    pub command: String,
    pub cwd: PathBuf,
}

struct FakeOsState {
    next_pid: u32,
    /// Live children: pid -> exit-notification sender.
    children: HashMap<u32, oneshot::Sender<Option<i32>>>,
    spawned: Vec<SpawnedProcess>,
    signals: Vec<(i32, SignalKind)>,
    spawn_failures: VecDeque<SpawnError>,
    /// When set, every spawned child exits immediately with this code.
    exit_on_spawn: Option<Option<i32>>,
    samples: HashMap<u32, VecDeque<MetricSample>>,
    default_sample: Option<MetricSample>,
    /// Whether SIGTERM ends a fake child (false simulates a child that
    /// ignores it).
    term_exits: bool,
    host: HostMetrics,
}

/// Scripted OS adapter: spawns are virtual, exits are test-controlled.
#[derive(Clone)]
pub struct FakeOsAdapter {
    inner: Arc<Mutex<FakeOsState>>,
}

impl Default for FakeOsAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeOsState {
                next_pid: 1000,
                children: HashMap::new(),
                spawned: Vec::new(),
                signals: Vec::new(),
                spawn_failures: VecDeque::new(),
                exit_on_spawn: None,
                samples: HashMap::new(),
                default_sample: None,
                term_exits: true,
                host: HostMetrics {
                    cpu_percent: 12.5,
                    memory_used_bytes: 4 << 30,
                    memory_total_bytes: 16 << 30,
                    memory_percent: 25.0,
                    load_average: (0.5, 0.4, 0.3),
                    uptime_seconds: 3600,
                },
            })),
        }
    }
}

impl FakeOsAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next spawn call.
    pub fn fail_next_spawn(&self, err: SpawnError) {
        self.inner.lock().spawn_failures.push_back(err);
    }

    /// Make every subsequent spawn exit immediately with `code`
    /// (crash-loop scripting). `None` clears the behavior.
    pub fn set_exit_on_spawn(&self, code: Option<Option<i32>>) {
        self.inner.lock().exit_on_spawn = code;
    }

    /// Simulate a child that ignores SIGTERM.
    pub fn set_term_exits(&self, term_exits: bool) {
        self.inner.lock().term_exits = term_exits;
    }

    /// Terminate a live fake child with the given exit code.
    pub fn exit(&self, pid: u32, code: Option<i32>) {
        let sender = self.inner.lock().children.remove(&pid);
        if let Some(tx) = sender {
            let _ = tx.send(code);
        }
    }

    /// Sample returned for any live pid without queued samples.
    pub fn set_default_sample(&self, sample: MetricSample) {
        self.inner.lock().default_sample = Some(sample);
    }

    /// Queue one sample for a specific pid.
    pub fn push_sample(&self, pid: u32, sample: MetricSample) {
        self.inner
            .lock()
            .samples
            .entry(pid)
            .or_default()
            .push_back(sample);
    }

    pub fn last_pid(&self) -> Option<u32> {
        self.inner.lock().spawned.last().map(|s| s.pid)
    }

    pub fn spawned(&self) -> Vec<SpawnedProcess> {
        self.inner.lock().spawned.clone()
    }

    pub fn signals(&self) -> Vec<(i32, SignalKind)> {
        self.inner.lock().signals.clone()
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        self.inner.lock().children.contains_key(&pid)
    }
}

#[async_trait]
impl OsAdapter for FakeOsAdapter {
    async fn spawn(&self, req: SpawnRequest) -> Result<Child, SpawnError> {
        let mut state = self.inner.lock();
        if let Some(err) = state.spawn_failures.pop_front() {
            return Err(err);
        }

        let pid = state.next_pid;
        state.next_pid += 1;

        let (tx, rx) = oneshot::channel();
        state.spawned.push(SpawnedProcess {
            pid,
            command: req.command.clone(),
            cwd: req.cwd.clone(),
        });

        match state.exit_on_spawn {
            Some(code) => {
                // Child dies before anyone can watch it
                let _ = tx.send(code);
            }
            None => {
                state.children.insert(pid, tx);
            }
        }

        Ok(Child {
            pid,
            pgid: pid as i32,
            inner: ChildInner::Fake(rx),
        })
    }

    async fn signal(&self, pgid: i32, kind: SignalKind) -> Result<(), OsError> {
        let sender = {
            let mut state = self.inner.lock();
            state.signals.push((pgid, kind));
            let ends_child = matches!(kind, SignalKind::Kill)
                || (state.term_exits
                    && matches!(kind, SignalKind::Term | SignalKind::Interrupt));
            if ends_child {
                state.children.remove(&(pgid as u32))
            } else {
                None
            }
        };
        if let Some(tx) = sender {
            let _ = tx.send(None);
        }
        Ok(())
    }

    async fn wait_exit(&self, child: Child) -> Result<Option<i32>, OsError> {
        match child.inner {
            ChildInner::Fake(rx) => Ok(rx.await.unwrap_or(None)),
            ChildInner::Unix(_) => Err(OsError::Other(
                "real child handed to the fake adapter".to_string(),
            )),
        }
    }

    async fn sample(&self, pid: u32) -> Result<MetricSample, SampleError> {
        let mut state = self.inner.lock();
        if let Some(queue) = state.samples.get_mut(&pid) {
            if let Some(sample) = queue.pop_front() {
                return Ok(sample);
            }
        }
        if !state.children.contains_key(&pid) {
            return Err(SampleError::NotFound(pid));
        }
        state
            .default_sample
            .clone()
            .ok_or_else(|| SampleError::Io(format!("no scripted sample for pid {pid}")))
    }

    async fn host_metrics(&self) -> Result<HostMetrics, OsError> {
        Ok(self.inner.lock().host.clone())
    }

    async fn list_connections(&self) -> Result<Vec<(u16, u32)>, OsError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
