// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sampler liveness tracking for the health endpoint.
//!
//! The daemon is healthy iff a sampler tick completed within twice the
//! monitor interval.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

pub struct TickHealth {
    last_tick: Mutex<Option<Instant>>,
    window: Duration,
}

impl TickHealth {
    pub fn new(monitor_interval: Duration) -> Self {
        Self {
            last_tick: Mutex::new(None),
            window: monitor_interval * 2,
        }
    }

    /// Record a completed sampler tick.
    pub fn stamp(&self) {
        *self.last_tick.lock() = Some(Instant::now());
    }

    pub fn is_healthy(&self) -> bool {
        self.last_tick
            .lock()
            .map(|t| t.elapsed() <= self.window)
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
