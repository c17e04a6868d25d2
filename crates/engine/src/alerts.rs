// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deduplicating alert bus with sink fan-out.
//!
//! Publishers (sampler, crash engine, workers) call `publish`; the bus
//! keeps a bounded in-memory history, suppresses repeats of the same
//! `(kind, process)` inside the cooldown window, and fans new alerts out
//! to one worker task per notification sink. Sink I/O never runs under the
//! bus lock.

use parking_lot::Mutex;
use pg_adapters::NotifySink;
use pg_core::{Alert, AlertId, AlertKind, AlertSeverity, Clock, IdGen, UuidIdGen};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::error::SupervisorError;

/// Bus tuning knobs.
#[derive(Debug, Clone)]
pub struct AlertBusConfig {
    /// Repeats of the same `(kind, process)` inside this window refresh the
    /// existing alert instead of storing a new one.
    pub cooldown: Duration,
    /// Most recent alerts retained in memory.
    pub history: usize,
    /// Per-sink queue bound; overflow drops the oldest non-critical entry.
    pub sink_queue: usize,
}

impl Default for AlertBusConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(300),
            history: 1000,
            sink_queue: 256,
        }
    }
}

struct DedupEntry {
    id: AlertId,
    last_publish: Instant,
}

struct BusState {
    /// Oldest at the front, newest at the back.
    history: VecDeque<Alert>,
    dedup: HashMap<(AlertKind, Option<String>), DedupEntry>,
}

struct SinkQueue {
    alerts: Mutex<VecDeque<Alert>>,
    wake: Notify,
    cap: usize,
    sink_name: &'static str,
}

impl SinkQueue {
    /// Enqueue for delivery, applying the overflow policy: drop the oldest
    /// entry below critical; an all-critical full queue rejects non-critical
    /// newcomers and stretches for critical ones.
    fn push(&self, alert: Alert) {
        {
            let mut queue = self.alerts.lock();
            if queue.len() >= self.cap {
                if let Some(pos) = queue
                    .iter()
                    .position(|a| a.severity < AlertSeverity::Critical)
                {
                    let dropped = queue.remove(pos);
                    tracing::warn!(
                        sink = self.sink_name,
                        dropped = dropped.map(|a| a.id.to_string()).unwrap_or_default(),
                        "notification queue full, dropped oldest non-critical alert"
                    );
                } else if alert.severity < AlertSeverity::Critical {
                    tracing::warn!(
                        sink = self.sink_name,
                        alert_id = %alert.id,
                        "notification queue full of critical alerts, dropping newcomer"
                    );
                    return;
                }
            }
            queue.push_back(alert);
        }
        self.wake.notify_one();
    }
}

/// Deduplicating fan-out from alert publishers to notification sinks.
pub struct AlertBus<C: Clock, G: IdGen = UuidIdGen> {
    clock: C,
    ids: G,
    config: AlertBusConfig,
    state: Mutex<BusState>,
    queues: Vec<Arc<SinkQueue>>,
}

impl<C: Clock> AlertBus<C> {
    /// Bus with UUID alert ids; spawns one delivery worker per sink.
    pub fn new(clock: C, config: AlertBusConfig, sinks: Vec<Arc<dyn NotifySink>>) -> Self {
        Self::with_ids(clock, UuidIdGen, config, sinks)
    }
}

impl<C: Clock, G: IdGen + 'static> AlertBus<C, G> {
    pub fn with_ids(
        clock: C,
        ids: G,
        config: AlertBusConfig,
        sinks: Vec<Arc<dyn NotifySink>>,
    ) -> Self {
        let mut queues = Vec::with_capacity(sinks.len());
        for sink in sinks {
            let queue = Arc::new(SinkQueue {
                alerts: Mutex::new(VecDeque::new()),
                wake: Notify::new(),
                cap: config.sink_queue.max(1),
                sink_name: sink.name(),
            });
            spawn_sink_worker(sink, Arc::clone(&queue));
            queues.push(queue);
        }
        Self {
            clock,
            ids,
            config,
            state: Mutex::new(BusState {
                history: VecDeque::new(),
                dedup: HashMap::new(),
            }),
            queues,
        }
    }

    /// Publish an alert.
    ///
    /// Returns the stored alert's id, or `None` when an unresolved alert
    /// with the same `(kind, process)` inside the cooldown absorbed it
    /// (its timestamp refreshes; nothing is enqueued).
    pub fn publish(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        process: Option<&str>,
        message: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Option<AlertId> {
        let now = self.clock.now();
        let wall = self.clock.wall_now();
        let key = (kind, process.map(str::to_string));

        let alert = {
            let mut state = self.state.lock();

            let dedup_hit = match state.dedup.get(&key) {
                Some(entry)
                    if now.duration_since(entry.last_publish) <= self.config.cooldown =>
                {
                    let id = entry.id.clone();
                    state
                        .history
                        .iter()
                        .any(|a| a.id == id && a.resolved_at.is_none())
                        .then_some(id)
                }
                _ => None,
            };

            if let Some(id) = dedup_hit {
                if let Some(existing) = state.history.iter_mut().find(|a| a.id == id) {
                    existing.created_at = wall;
                }
                if let Some(entry) = state.dedup.get_mut(&key) {
                    entry.last_publish = now;
                }
                tracing::debug!(kind = %kind, process = ?process, "alert deduplicated");
                return None;
            }

            let alert = Alert {
                id: AlertId::new(self.ids.next()),
                kind,
                severity,
                process: key.1.clone(),
                message: message.into(),
                metadata,
                created_at: wall,
                acknowledged_at: None,
                resolved_at: None,
            };
            state.dedup.insert(
                key,
                DedupEntry {
                    id: alert.id.clone(),
                    last_publish: now,
                },
            );
            state.history.push_back(alert.clone());
            while state.history.len() > self.config.history {
                state.history.pop_front();
            }
            alert
        };

        tracing::info!(
            alert_id = %alert.id,
            kind = %alert.kind,
            severity = %alert.severity,
            process = ?alert.process,
            "alert published"
        );
        for queue in &self.queues {
            queue.push(alert.clone());
        }
        Some(alert.id)
    }

    /// Idempotent acknowledge.
    pub fn acknowledge(&self, id: &str) -> Result<(), SupervisorError> {
        let wall = self.clock.wall_now();
        let mut state = self.state.lock();
        let alert = state
            .history
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| SupervisorError::UnknownAlert(id.to_string()))?;
        if alert.acknowledged_at.is_none() {
            alert.acknowledged_at = Some(wall);
        }
        Ok(())
    }

    /// Idempotent resolve; also drops the dedup entry so a later repeat
    /// stores a fresh alert.
    pub fn resolve(&self, id: &str) -> Result<(), SupervisorError> {
        let wall = self.clock.wall_now();
        let mut state = self.state.lock();
        let alert = state
            .history
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| SupervisorError::UnknownAlert(id.to_string()))?;
        if alert.resolved_at.is_none() {
            alert.resolved_at = Some(wall);
        }
        let resolved_id = alert.id.clone();
        state.dedup.retain(|_, entry| entry.id != resolved_id);
        Ok(())
    }

    /// Alerts in reverse chronological order.
    pub fn list(&self, active_only: bool) -> Vec<Alert> {
        let state = self.state.lock();
        state
            .history
            .iter()
            .rev()
            .filter(|a| !active_only || a.is_active())
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Alert> {
        let state = self.state.lock();
        state.history.iter().find(|a| a.id == *id).cloned()
    }
}

fn spawn_sink_worker(sink: Arc<dyn NotifySink>, queue: Arc<SinkQueue>) {
    tokio::spawn(async move {
        loop {
            let next = { queue.alerts.lock().pop_front() };
            match next {
                Some(alert) => {
                    // A sink reports once; failures are logged, never retried.
                    if let Err(e) = sink.deliver(&alert).await {
                        tracing::warn!(
                            sink = sink.name(),
                            alert_id = %alert.id,
                            error = %e,
                            "alert delivery failed"
                        );
                    }
                }
                None => queue.wake.notified().await,
            }
        }
    });
}

#[cfg(test)]
#[path = "alerts_tests.rs"]
mod tests;
