// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert records emitted by the supervisor, sampler, and crash engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Stable identifier for one alert record (UUID in production).
    pub struct AlertId;
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CpuHigh,
    MemoryHigh,
    ProcessCrashed,
    ProcessDisabled,
    Quarantined,
    DependencyKilled,
    ThresholdCleared,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::CpuHigh => write!(f, "cpu_high"),
            AlertKind::MemoryHigh => write!(f, "memory_high"),
            AlertKind::ProcessCrashed => write!(f, "process_crashed"),
            AlertKind::ProcessDisabled => write!(f, "process_disabled"),
            AlertKind::Quarantined => write!(f, "quarantined"),
            AlertKind::DependencyKilled => write!(f, "dependency_killed"),
            AlertKind::ThresholdCleared => write!(f, "threshold_cleared"),
        }
    }
}

/// Severity ordering matters: overflow handling in the notification queues
/// drops the lowest severities first and never drops `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// One alert record, retained in a bounded in-memory history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    /// Originating process, when the alert concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    pub message: String,
    /// Opaque context for consumers (exit codes, rolling means, decision
    /// rationale).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Active means not yet resolved.
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
