// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window crash accounting and restart-policy decisions.
//!
//! One `CrashTracker` per process, owned by its worker. The tracker is
//! pure: it consumes exits and clock readings and returns a decision; the
//! worker applies state changes, alerts, and cascades.

use chrono::{DateTime, Utc};
use pg_core::{CrashAction, CrashRecord, ProcessConfig};
use std::fmt;
use std::time::{Duration, Instant};

/// Why a process was disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    /// Hit `max_crashes` inside the crash window with the `disable` action.
    CrashWindow,
    /// Exceeded `max_restarts` consecutive automatic restarts.
    RestartCap,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisableReason::CrashWindow => write!(f, "crash_window"),
            DisableReason::RestartCap => write!(f, "restart_cap"),
        }
    }
}

/// Outcome of consulting the crash engine after an unexpected exit.
#[derive(Debug, Clone, PartialEq)]
pub enum CrashDecision {
    /// No automatic action; the process stays down.
    Hold,
    /// Schedule a restart after the given delay.
    RestartAfter(Duration),
    /// Disable until an explicit force-enable.
    Disable { reason: DisableReason },
    /// Block starts until the given instant, then self-clear.
    Quarantine { until: Instant },
    /// Disable this process and stop its transitive dependents.
    KillDependents,
}

impl CrashDecision {
    /// Short name for alert metadata and logs.
    pub fn name(&self) -> &'static str {
        match self {
            CrashDecision::Hold => "hold",
            CrashDecision::RestartAfter(_) => "restart",
            CrashDecision::Disable { .. } => "disable",
            CrashDecision::Quarantine { .. } => "quarantine",
            CrashDecision::KillDependents => "kill_dependencies",
        }
    }
}

/// Per-process crash history inside the policy window.
#[derive(Debug, Default)]
pub struct CrashTracker {
    records: Vec<CrashRecord>,
    consecutive_restarts: u32,
}

impl CrashTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_restarts(&self) -> u32 {
        self.consecutive_restarts
    }

    /// Records currently retained (already trimmed to the window at the
    /// last exit).
    pub fn records(&self) -> &[CrashRecord] {
        &self.records
    }

    /// Crashes still inside the window as of `now`.
    pub fn crashes_in_window(&self, config: &ProcessConfig, now: Instant) -> usize {
        match config.crash.window() {
            Some(window) => self
                .records
                .iter()
                .filter(|r| now.duration_since(r.at) <= window)
                .count(),
            None => self.records.len(),
        }
    }

    /// Clear records and the consecutive-restart counter (`reset_crashes`,
    /// `force_enable`).
    pub fn reset(&mut self) {
        self.records.clear();
        self.consecutive_restarts = 0;
    }

    /// A sample proved the process stable; the consecutive-restart counter
    /// starts over.
    pub fn note_stable_uptime(&mut self, uptime: Duration, stable_after: Duration) {
        if uptime >= stable_after {
            self.consecutive_restarts = 0;
        }
    }

    /// Consume one unexpected exit and decide what happens next.
    ///
    /// Every unexpected exit counts as a crash, including a clean exit
    /// right after start: a supervised process is expected to keep running.
    pub fn on_exit(
        &mut self,
        config: &ProcessConfig,
        disabled: bool,
        quarantined: bool,
        now: Instant,
        wall: DateTime<Utc>,
        exit_code: Option<i32>,
        run_duration: Duration,
    ) -> CrashDecision {
        self.records.push(CrashRecord {
            at: now,
            wall,
            exit_code,
            run_duration,
        });
        if let Some(window) = config.crash.window() {
            self.records
                .retain(|r| now.duration_since(r.at) <= window);
        }

        if disabled || quarantined {
            return CrashDecision::Hold;
        }

        if self.records.len() as u32 >= config.crash.max_crashes {
            return match config.crash.action {
                CrashAction::Disable => CrashDecision::Disable {
                    reason: DisableReason::CrashWindow,
                },
                CrashAction::Quarantine => {
                    self.records.clear();
                    CrashDecision::Quarantine {
                        until: now + config.crash.quarantine(),
                    }
                }
                CrashAction::KillDependencies => CrashDecision::KillDependents,
            };
        }

        if !config.auto_restart {
            return CrashDecision::Hold;
        }

        self.consecutive_restarts += 1;
        if self.consecutive_restarts > config.max_restarts {
            return CrashDecision::Disable {
                reason: DisableReason::RestartCap,
            };
        }
        CrashDecision::RestartAfter(config.restart_delay())
    }
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
