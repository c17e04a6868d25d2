// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threshold hysteresis and the per-tick metrics frame.
//!
//! The sampler itself is the tick pass in
//! [`Supervisor::run_sample_tick`](crate::Supervisor::run_sample_tick);
//! this module holds the pure pieces.

use chrono::{DateTime, Utc};
use pg_core::{Alert, HostMetrics, MetricSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How far below the threshold a rolling mean must fall before the
/// corresponding alert clears. Prevents flapping at the boundary.
pub const CLEAR_MARGIN: f64 = 5.0;

/// A threshold boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// The rolling mean crossed the threshold upward.
    Raised,
    /// The rolling mean fell to `threshold - CLEAR_MARGIN` or below.
    Cleared,
}

/// Hysteresis state for one metric of one process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdWatch {
    above: bool,
}

impl ThresholdWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_above(&self) -> bool {
        self.above
    }

    /// Forget the raised state (new process run).
    pub fn reset(&mut self) {
        self.above = false;
    }

    /// Feed one rolling mean; returns a crossing when the state flips.
    pub fn observe(&mut self, mean: f64, threshold: f64) -> Option<Crossing> {
        if !self.above && mean > threshold {
            self.above = true;
            Some(Crossing::Raised)
        } else if self.above && mean <= threshold - CLEAR_MARGIN {
            self.above = false;
            Some(Crossing::Cleared)
        } else {
            None
        }
    }
}

/// One frame pushed to metric-stream subscribers per sampler tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsFrame {
    pub timestamp: DateTime<Utc>,
    /// Host aggregates; absent when the host read failed this tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<HostMetrics>,
    /// Per-process samples collected this tick.
    pub processes: BTreeMap<String, MetricSample>,
    /// Currently active (unresolved) alerts.
    pub alerts: Vec<Alert>,
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
