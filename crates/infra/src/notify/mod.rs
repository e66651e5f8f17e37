//! Outbound e-mail notifications.
//!
//! Domain code builds a [`Notification`]; [`NotificationDispatcher`] renders
//! it into an [`OutboundEmail`] and hands it to a [`Mailer`] under a timeout.

pub mod dispatcher;
pub mod mailer;
pub mod templates;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use mailer::{LogMailer, MailError, Mailer, RecordingMailer};
pub use templates::{AbsenceDetails, Notification, SalaryLine};

/// A file attached to an e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn csv(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content_type: "text/csv; charset=utf-8".to_string(),
            content: content.into().into_bytes(),
        }
    }
}

/// A fully rendered message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}
