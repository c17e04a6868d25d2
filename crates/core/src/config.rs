// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared configuration for one supervised process.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_max_restarts() -> u32 {
    5
}

fn default_cpu_threshold() -> f64 {
    90.0
}

fn default_memory_threshold() -> f64 {
    90.0
}

fn default_max_crashes() -> u32 {
    3
}

fn default_window_seconds() -> u64 {
    60
}

fn default_quarantine_seconds() -> u64 {
    300
}

/// What the crash engine does once a process hits `max_crashes` inside the
/// sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashAction {
    /// Disable the process until an explicit force-enable.
    Disable,
    /// Disable for `quarantine_seconds`, then allow starts again.
    Quarantine,
    /// Disable the process and stop everything that depends on it.
    KillDependencies,
}

impl std::fmt::Display for CrashAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrashAction::Disable => write!(f, "disable"),
            CrashAction::Quarantine => write!(f, "quarantine"),
            CrashAction::KillDependencies => write!(f, "kill_dependencies"),
        }
    }
}

/// Crash-window policy for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashPolicy {
    /// Crashes inside the window before the action fires. Zero means the
    /// first crash already triggers it.
    #[serde(default = "default_max_crashes")]
    pub max_crashes: u32,

    /// Sliding window length. Zero means every crash is inside the window.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    #[serde(default = "default_crash_action")]
    pub action: CrashAction,

    /// Only used when `action` is `quarantine`.
    #[serde(default = "default_quarantine_seconds")]
    pub quarantine_seconds: u64,
}

fn default_crash_action() -> CrashAction {
    CrashAction::Disable
}

impl Default for CrashPolicy {
    fn default() -> Self {
        Self {
            max_crashes: default_max_crashes(),
            window_seconds: default_window_seconds(),
            action: default_crash_action(),
            quarantine_seconds: default_quarantine_seconds(),
        }
    }
}

impl CrashPolicy {
    /// Window as a `Duration`; `None` when the window is unbounded (zero).
    pub fn window(&self) -> Option<Duration> {
        (self.window_seconds > 0).then(|| Duration::from_secs(self.window_seconds))
    }

    pub fn quarantine(&self) -> Duration {
        Duration::from_secs(self.quarantine_seconds)
    }
}

/// Declared configuration for one supervised process.
///
/// Persisted in the daemon's JSON configuration file; also accepted over the
/// control plane for dynamic registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Unique, stable identity. Used for log file names and dependency edges.
    pub name: String,

    /// Shell command line to launch.
    pub command: String,

    /// Working directory; daemon cwd when unset.
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment overrides applied on top of the daemon environment.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Informational process-kind tag (e.g. "web", "worker").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default = "default_true")]
    pub auto_restart: bool,

    /// Consecutive auto-restarts allowed before the process is disabled
    /// regardless of the crash action.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    #[serde(default)]
    pub restart_delay_seconds: f64,

    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold_percent: f64,

    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_percent: f64,

    #[serde(default)]
    pub crash: CrashPolicy,

    /// Names of processes this one requires to be running, in declaration order.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Explicit stdout log path; derived from the name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl ProcessConfig {
    /// Minimal config for a name and command; policy fields take defaults.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            kind: None,
            auto_restart: default_true(),
            max_restarts: default_max_restarts(),
            restart_delay_seconds: 0.0,
            cpu_threshold_percent: default_cpu_threshold(),
            memory_threshold_percent: default_memory_threshold(),
            crash: CrashPolicy::default(),
            depends_on: Vec::new(),
            log_file: None,
        }
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.restart_delay_seconds).unwrap_or(Duration::ZERO)
    }

    /// Validate everything checkable without the full process table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        // The name becomes a log file stem; keep it path-safe.
        if self.name.contains('/') || self.name.contains("..") {
            return Err(ConfigError::InvalidName(self.name.clone()));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand(self.name.clone()));
        }
        for (field, value) in [
            ("cpu_threshold_percent", self.cpu_threshold_percent),
            ("memory_threshold_percent", self.memory_threshold_percent),
        ] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange {
                    process: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        if !self.restart_delay_seconds.is_finite() || self.restart_delay_seconds < 0.0 {
            return Err(ConfigError::InvalidRestartDelay {
                process: self.name.clone(),
                value: self.restart_delay_seconds,
            });
        }
        if self.depends_on.iter().any(|d| d == &self.name) {
            return Err(ConfigError::SelfDependency {
                process: self.name.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
