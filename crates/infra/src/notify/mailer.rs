use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::OutboundEmail;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("no recipient configured for {0}")]
    NoRecipient(String),
}

/// Transport seam. Implementations deliver one message or fail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Writes every message to the log instead of sending it. Used when no
/// real transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "mail delivered to log transport"
        );
        Ok(())
    }
}

/// Keeps every message in memory. Can be switched to fail, to exercise the
/// error paths of callers.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut f) = self.failing.lock() {
            *f = failing;
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(MailError::Transport("recording mailer set to fail".into()));
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("recording mailer poisoned".into()))?
            .push(email.clone());
        Ok(())
    }
}
