// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process table shared between the supervisor API, the sampler tick, and
//! the per-process workers.
//!
//! Workers and queries take the registry read lock; register/deregister
//! take the write lock. Each worker is the only writer of its own
//! `InstanceState`; queries take brief snapshots through the mutex.

use crate::crash::CrashTracker;
use crate::sampler::ThresholdWatch;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use pg_core::{DependencyGraph, ProcessConfig, ProcessState, SampleRing};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use super::worker::ProcessMsg;

pub(crate) struct Registry {
    pub entries: IndexMap<String, Entry>,
    pub graph: DependencyGraph,
}

pub(crate) struct Entry {
    pub config: ProcessConfig,
    pub shared: Arc<Mutex<InstanceState>>,
    pub mailbox: mpsc::UnboundedSender<ProcessMsg>,
}

/// Runtime state of one process instance.
pub(crate) struct InstanceState {
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub pgid: Option<i32>,
    pub started_at: Option<Instant>,
    pub started_wall: Option<DateTime<Utc>>,
    /// True once the first run has been spawned; later spawns count as
    /// restarts.
    pub has_run: bool,
    pub restarts_total: u32,
    /// Cleared only by force-enable.
    pub disabled: bool,
    pub quarantine_until: Option<Instant>,
    pub ring: SampleRing,
    pub crashes: CrashTracker,
    pub cpu_watch: ThresholdWatch,
    pub memory_watch: ThresholdWatch,
}

impl InstanceState {
    pub fn new(ring_capacity: usize) -> Self {
        Self {
            state: ProcessState::Stopped,
            pid: None,
            pgid: None,
            started_at: None,
            started_wall: None,
            has_run: false,
            restarts_total: 0,
            disabled: false,
            quarantine_until: None,
            ring: SampleRing::new(ring_capacity),
            crashes: CrashTracker::new(),
            cpu_watch: ThresholdWatch::new(),
            memory_watch: ThresholdWatch::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// Dependencies of `name` that are not currently Running.
    pub fn unready_dependencies(&self, name: &str) -> Vec<String> {
        self.graph
            .dependencies(name)
            .iter()
            .filter(|dep| match self.entries.get(dep.as_str()) {
                Some(entry) => entry.shared.lock().state != ProcessState::Running,
                None => true,
            })
            .cloned()
            .collect()
    }
}
