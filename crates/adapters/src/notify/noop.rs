// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op notification sink.

use super::{NotifyError, NotifySink};
use async_trait::async_trait;
use pg_core::Alert;

/// Sink that silently discards all alerts.
///
/// Used when no notification transport is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpSink;

impl NoOpSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifySink for NoOpSink {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn deliver(&self, _alert: &Alert) -> Result<(), NotifyError> {
        Ok(())
    }
}
