// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification sinks.
//!
//! The alert bus fans out to these; a sink delivers one alert, reports
//! success or failure once, and never retries on its own.

mod desktop;
mod email;
mod noop;
mod slack;
mod webhook;

pub use desktop::DesktopSink;
pub use email::{EmailConfig, EmailSink};
pub use noop::NoOpSink;
pub use slack::SlackSink;
pub use webhook::WebhookSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSink;

use async_trait::async_trait;
use pg_core::Alert;
use thiserror::Error;

/// Errors from notification sinks
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("sink misconfigured: {0}")]
    Config(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// One outbound notification transport.
#[async_trait]
pub trait NotifySink: Send + Sync + 'static {
    /// Short name for logs ("email", "webhook", "slack").
    fn name(&self) -> &'static str;

    /// Deliver one alert. Called at most once per alert by the bus.
    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// One-line alert rendering shared by the text-oriented sinks.
pub(crate) fn render_line(alert: &Alert) -> String {
    match &alert.process {
        Some(process) => format!(
            "[{}] {} ({}): {}",
            alert.severity, alert.kind, process, alert.message
        ),
        None => format!("[{}] {}: {}", alert.severity, alert.kind, alert.message),
    }
}
