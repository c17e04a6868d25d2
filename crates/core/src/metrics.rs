// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric samples and the per-process sample ring.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource-usage observation for a supervised process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Wall-clock capture time, for display.
    pub taken_at: DateTime<Utc>,
    /// CPU usage in percent of one core.
    pub cpu_percent: f64,
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// RSS as a percentage of total host memory.
    pub memory_percent: f64,
    pub threads: u32,
    pub open_files: u32,
    /// Open socket descriptors.
    pub connections: u32,
    /// Seconds since the current run started. Filled in by the supervisor;
    /// the OS facade reports zero.
    pub uptime_seconds: f64,
}

/// Host-wide aggregates, reported alongside per-process samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub memory_percent: f64,
    pub load_average: (f64, f64, f64),
    pub uptime_seconds: u64,
}

/// Fixed-capacity ring of the most recent samples.
///
/// Capacity is fixed at construction; appending past capacity overwrites the
/// oldest entry without allocating.
#[derive(Debug, Clone)]
pub struct SampleRing {
    cap: usize,
    head: usize,
    items: Vec<MetricSample>,
}

impl SampleRing {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            head: 0,
            items: Vec::with_capacity(cap.max(1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }

    pub fn push(&mut self, sample: MetricSample) {
        if self.items.len() < self.cap {
            self.items.push(sample);
        } else {
            self.items[self.head] = sample;
            self.head = (self.head + 1) % self.cap;
        }
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&MetricSample> {
        if self.items.is_empty() {
            return None;
        }
        let idx = if self.items.len() < self.cap {
            self.items.len() - 1
        } else {
            (self.head + self.cap - 1) % self.cap
        };
        self.items.get(idx)
    }

    /// Samples oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        let (tail, front) = if self.items.len() < self.cap {
            (&self.items[..], &[][..])
        } else {
            let (front, tail) = self.items.split_at(self.head);
            (tail, front)
        };
        tail.iter().chain(front.iter())
    }

    /// Mean of `f` over the `window` most recent samples, or `None` when
    /// fewer than `window` samples have been collected.
    pub fn rolling_mean(&self, window: usize, f: impl Fn(&MetricSample) -> f64) -> Option<f64> {
        if window == 0 || self.items.len() < window {
            return None;
        }
        let sum: f64 = self
            .iter()
            .skip(self.items.len() - window)
            .map(&f)
            .sum();
        Some(sum / window as f64)
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
