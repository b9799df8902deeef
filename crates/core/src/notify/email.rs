//! Email delivery via an SMTP relay.
//!
//! Uses the `lettre` crate to send plain-text conflict reports.

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use super::{MailSender, OutgoingMail};
use crate::config::NotificationConfig;
use crate::errors::NotificationError;

/// SMTP relay sender.
pub struct SmtpMailer {
    relay: String,
    port: u16,
    starttls: bool,
}

impl SmtpMailer {
    pub fn new(relay: impl Into<String>, port: u16, starttls: bool) -> Self {
        let relay = relay.into();
        info!(smtp = %relay, port, starttls, "initializing email notifier");
        Self {
            relay,
            port,
            starttls,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(&config.smtp_relay, config.smtp_port, config.starttls)
    }

    /// Build an async SMTP transport for the configured relay.
    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let transport = if self.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.relay)
                .map_err(|e| {
                    NotificationError::EmailError(format!("SMTP connection error: {}", e))
                })?
                .port(self.port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.relay)
                .port(self.port)
                .build()
        };
        Ok(transport)
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError> {
        debug!(subject = %mail.subject, to = %mail.to, cc = ?mail.cc, "sending email");
        let message = build_message(mail)?;
        let transport = self.build_transport()?;

        match transport.send(message).await {
            Ok(_) => {
                info!(to = %mail.to, "email sent successfully");
                Ok(())
            }
            Err(e) => {
                warn!(to = %mail.to, error = %e, "failed to send email");
                Err(NotificationError::EmailError(format!(
                    "SMTP send to '{}' failed: {}",
                    mail.to, e
                )))
            }
        }
    }
}

fn parse_mailbox(address: &str, role: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|e| NotificationError::InvalidAddress(format!("{} '{}': {}", role, address, e)))
}

/// Build the RFC 5322 message for `mail`.
///
/// Recipients that do not parse are dropped with a warning so one bad
/// address does not block the report. Without any usable recipient the
/// result is [`NotificationError::InvalidAddress`].
pub fn build_message(mail: &OutgoingMail) -> Result<Message, NotificationError> {
    let mut builder = Message::builder()
        .from(parse_mailbox(&mail.from, "from address")?)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    let mut recipients = 0;
    match parse_mailbox(&mail.to, "recipient") {
        Ok(to) => {
            builder = builder.to(to);
            recipients += 1;
        }
        Err(e) => warn!(error = %e, "dropping unparseable recipient; sending to cc only"),
    }
    for cc in &mail.cc {
        match parse_mailbox(cc, "cc recipient") {
            Ok(cc) => {
                builder = builder.cc(cc);
                recipients += 1;
            }
            Err(e) => warn!(error = %e, "dropping unparseable cc recipient"),
        }
    }
    if recipients == 0 {
        return Err(NotificationError::InvalidAddress(format!(
            "none of '{}' or {:?} is a valid mailbox",
            mail.to, mail.cc
        )));
    }

    builder
        .body(mail.body.clone())
        .map_err(|e| NotificationError::EmailError(format!("failed to build email: {}", e)))
}
