// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slack incoming-webhook sink.
//!
//! A specialization of the generic webhook: Slack expects a `{"text": …}`
//! payload rather than the raw alert record.

use super::{render_line, NotifyError, NotifySink};
use async_trait::async_trait;
use pg_core::{Alert, AlertSeverity};
use std::time::Duration;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackSink {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }

    fn emoji(severity: AlertSeverity) -> &'static str {
        match severity {
            AlertSeverity::Info => ":information_source:",
            AlertSeverity::Warning => ":warning:",
            AlertSeverity::Critical => ":rotating_light:",
        }
    }
}

#[async_trait]
impl NotifySink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "text": format!("{} {}", Self::emoji(alert.severity), render_line(alert)),
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}
