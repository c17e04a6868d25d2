// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake notification sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{NotifyError, NotifySink};
use async_trait::async_trait;
use parking_lot::Mutex;
use pg_core::Alert;
use std::sync::Arc;

struct FakeSinkState {
    delivered: Vec<Alert>,
    fail: bool,
}

/// Records every delivered alert; can be scripted to fail.
#[derive(Clone)]
pub struct FakeSink {
    inner: Arc<Mutex<FakeSinkState>>,
}

impl Default for FakeSink {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeSinkState {
                delivered: Vec::new(),
                fail: false,
            })),
        }
    }
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts delivered so far.
    pub fn delivered(&self) -> Vec<Alert> {
        self.inner.lock().delivered.clone()
    }

    /// Make every subsequent delivery fail.
    pub fn set_fail(&self, fail: bool) {
        self.inner.lock().fail = fail;
    }
}

#[async_trait]
impl NotifySink for FakeSink {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut state = self.inner.lock();
        if state.fail {
            return Err(NotifyError::Delivery("scripted failure".to_string()));
        }
        state.delivered.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
