// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process lifecycle states and crash records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of a supervised process.
///
/// `Disabled` and `Quarantined` are sticky: no automatic transition leaves
/// them. `Failed` is terminal until an action (automatic restart timer or a
/// user command) moves the process along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
    Disabled,
    Quarantined,
}

impl ProcessState {
    /// True while the instance owns a live PID.
    pub fn has_pid(self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }

    /// States a `start` request is accepted from.
    pub fn can_start(self) -> bool {
        matches!(self, ProcessState::Stopped | ProcessState::Failed)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Starting => write!(f, "starting"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Failed => write!(f, "failed"),
            ProcessState::Disabled => write!(f, "disabled"),
            ProcessState::Quarantined => write!(f, "quarantined"),
        }
    }
}

/// One unexpected exit, kept in insertion order and trimmed to the
/// configured crash window.
#[derive(Debug, Clone)]
pub struct CrashRecord {
    /// Monotonic instant, used for window eviction.
    pub at: Instant,
    /// Wall-clock time, for display.
    pub wall: DateTime<Utc>,
    /// Exit code; `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    /// How long the run lasted before the exit.
    pub run_duration: Duration,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
