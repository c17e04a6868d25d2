// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for duration decisions.
//!
//! Every duration decision in the supervisor (crash windows, quarantine,
//! restart delays, hysteresis) runs on the monotonic clock; the wall clock
//! is only consulted for user-facing display.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic now.
    fn now(&self) -> Instant;

    /// Wall-clock now, for display only.
    fn wall_now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct FakeClockState {
    now: Instant,
    wall: DateTime<Utc>,
}

/// Manually-advanced clock for tests.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                now: Instant::now(),
                wall: Utc::now(),
            })),
        }
    }

    /// Advance both the monotonic and wall clock by `d`.
    pub fn advance(&self, d: Duration) {
        let delta = chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero());
        let mut state = self.inner.lock();
        state.now += d;
        state.wall = state.wall + delta;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().now
    }

    fn wall_now(&self) -> DateTime<Utc> {
        self.inner.lock().wall
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
