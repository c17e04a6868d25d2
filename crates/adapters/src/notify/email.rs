// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SMTP notification sink.

use super::{render_line, NotifyError, NotifySink};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use pg_core::Alert;

/// SMTP connection settings, as loaded from the daemon configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// STARTTLS when true; plaintext relay otherwise.
    pub use_tls: bool,
    /// Sender mailbox; a ProcessGuard default when unset.
    pub from: Option<String>,
    pub recipients: Vec<String>,
}

pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailSink {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        if config.recipients.is_empty() {
            return Err(NotifyError::Config(
                "email sink needs at least one recipient".to_string(),
            ));
        }

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                .map_err(|e| NotifyError::Config(format!("smtp relay {}: {e}", config.server)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        };
        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = config
            .from
            .as_deref()
            .unwrap_or("ProcessGuard <processguard@localhost>")
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::Config(format!("from address: {e}")))?;

        let recipients = config
            .recipients
            .iter()
            .map(|r| {
                r.parse::<Mailbox>()
                    .map_err(|e| NotifyError::Config(format!("recipient {r}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transport: builder.build(),
            from,
            recipients,
        })
    }
}

#[async_trait]
impl NotifySink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, alert: &Alert) -> Result<(), NotifyError> {
        let mut body = format!("{}\n\ncreated: {}\n", alert.message, alert.created_at);
        if !alert.metadata.is_empty() {
            let meta = serde_json::to_string_pretty(&alert.metadata)
                .unwrap_or_else(|_| "{}".to_string());
            body.push_str("\n");
            body.push_str(&meta);
            body.push('\n');
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(render_line(alert));
        for to in &self.recipients {
            builder = builder.to(to.clone());
        }
        let email = builder
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Delivery(format!("build message: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}
