//! Plain-text alert mail over a trusted relay.
//!
//! One SMTP session per recipient, no auth, no TLS, no retry: the relay is
//! assumed to be a local or intranet host that accepts by address.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::debug;

use crate::config::BotConfig;

/// Pause between per-recipient sends so the relay is not slammed.
const SEND_SPACING: Duration = Duration::from_millis(100);
/// SMTP command timeout; generous for a local relay.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Clone)]
pub struct Notifier {
    coin: String,
    mail_from: String,
    mail_to: Vec<String>,
    mail_host: String,
}

impl Notifier {
    pub fn new(
        coin: impl Into<String>,
        mail_from: impl Into<String>,
        mail_to: Vec<String>,
        mail_host: impl Into<String>,
    ) -> Self {
        Self {
            coin: coin.into(),
            mail_from: mail_from.into(),
            mail_to,
            mail_host: mail_host.into(),
        }
    }

    pub fn from_config(config: &BotConfig) -> Self {
        Self::new(
            config.coin.clone(),
            config.mail_from.clone(),
            config.mail_to.clone(),
            config.mail_host.clone(),
        )
    }

    /// Send `subject` (coin-tagged) to every configured recipient, one SMTP
    /// session each. Blank recipients are skipped; the body falls back to
    /// the subject text when not supplied. The first failure propagates and
    /// aborts the remaining sends. Returns the number of messages sent.
    pub fn send_email(&self, subject: &str, body: Option<&str>) -> Result<usize> {
        let mut sent = 0;
        for recipient in &self.mail_to {
            let recipient = recipient.trim();
            if recipient.is_empty() {
                continue;
            }
            if sent > 0 {
                std::thread::sleep(SEND_SPACING);
            }
            self.send_one(recipient, subject, body)?;
            sent += 1;
        }
        Ok(sent)
    }

    fn send_one(&self, recipient: &str, subject: &str, body: Option<&str>) -> Result<()> {
        let email = Message::builder()
            .from(
                self.mail_from
                    .parse()
                    .with_context(|| format!("invalid sender address {}", self.mail_from))?,
            )
            .to(recipient
                .parse()
                .with_context(|| format!("invalid recipient address {recipient}"))?)
            .subject(format!("{} {}", self.coin, subject))
            .header(ContentType::TEXT_PLAIN)
            .body(body.unwrap_or(subject).to_string())
            .context("failed to build message")?;

        let (host, port) = split_host_port(&self.mail_host);
        let mailer = SmtpTransport::builder_dangerous(host)
            .port(port)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        mailer
            .send(&email)
            .with_context(|| format!("smtp send to {recipient} via {} failed", self.mail_host))?;
        debug!(%recipient, "notification sent");
        Ok(())
    }
}

/// Split an optional `:port` off a relay endpoint, defaulting to port 25.
fn split_host_port(endpoint: &str) -> (&str, u16) {
    if let Some((host, port)) = endpoint.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return (host, port);
        }
    }
    (endpoint, DEFAULT_SMTP_PORT)
}
