//! Conflict notification: report composition, delivery, and deduplication.
//!
//! A conflict report is sent at most once per (source, target, commit). The
//! [`NotificationLedger`] remembers what was already sent across runs and the
//! [`MailSender`] delivers new reports.

pub mod email;
pub mod marker;
pub mod report;

use async_trait::async_trait;

use crate::errors::NotificationError;

pub use email::SmtpMailer;
pub use marker::{FileMarkerLedger, MarkerKey, NotificationLedger};
pub use report::{ConflictReport, ReportContext};

/// A fully addressed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        cc: Vec<String>,
        report: ConflictReport,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            cc,
            subject: report.subject,
            body: report.body,
        }
    }
}

/// Delivers a notification.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{MailSender, OutgoingMail};
    use crate::errors::NotificationError;

    #[derive(Default, Clone, Copy)]
    pub(crate) enum Failure {
        #[default]
        Off,
        /// Relay outage: worth retrying.
        Relay,
        /// No deliverable address: retrying cannot help.
        Address,
    }

    /// Keeps every mail it is asked to send; optionally fails instead.
    #[derive(Default)]
    pub(crate) struct RecordingMailer {
        pub(crate) sent: Mutex<Vec<OutgoingMail>>,
        pub(crate) failure: Failure,
    }

    impl RecordingMailer {
        pub(crate) fn failing() -> Self {
            Self {
                failure: Failure::Relay,
                ..Self::default()
            }
        }

        pub(crate) fn rejecting() -> Self {
            Self {
                failure: Failure::Address,
                ..Self::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<OutgoingMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MailSender for RecordingMailer {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError> {
            match self.failure {
                Failure::Off => {
                    self.sent.lock().unwrap().push(mail.clone());
                    Ok(())
                }
                Failure::Relay => Err(NotificationError::EmailError("relay unavailable".into())),
                Failure::Address => Err(NotificationError::InvalidAddress(format!(
                    "recipient '{}': Invalid input",
                    mail.to
                ))),
            }
        }
    }
}
