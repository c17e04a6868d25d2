// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic HTTP webhook sink: POSTs the alert record as JSON.

use super::{NotifyError, NotifySink};
use async_trait::async_trait;
use pg_core::Alert;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;

/// Request timeout; a sink must not stall the notification worker.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, headers: &HashMap<String, String>) -> Result<Self, NotifyError> {
        let mut map = HeaderMap::new();
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| NotifyError::Config(format!("header {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NotifyError::Config(format!("header {key}: {e}")))?;
            map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            headers: map,
        })
    }
}

#[async_trait]
impl NotifySink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(alert)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        response
            .error_for_status()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}
