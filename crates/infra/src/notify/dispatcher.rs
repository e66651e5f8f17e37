use std::sync::Arc;
use std::time::Duration;

use super::mailer::{MailError, Mailer};
use super::templates::Notification;
use super::OutboundEmail;

/// Outcome of a multi-recipient send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    /// Recipients that were `None` or blank.
    pub skipped: usize,
    pub failed: Vec<(String, MailError)>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders notifications and sends them through a [`Mailer`], each send
/// bounded by `timeout`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    from: String,
    reply_to: Option<String>,
    timeout: Duration,
}

impl core::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("from", &self.from)
            .field("reply_to", &self.reply_to)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, reply_to: Option<String>, timeout: Duration) -> Self {
        Self {
            mailer,
            from: from.into(),
            reply_to,
            timeout,
        }
    }

    pub fn compose(&self, to: &str, notification: &Notification) -> OutboundEmail {
        let rendered = notification.render();
        OutboundEmail {
            from: self.from.clone(),
            to: to.to_string(),
            reply_to: self.reply_to.clone(),
            subject: rendered.subject,
            html: rendered.html,
            attachments: rendered.attachments,
        }
    }

    /// Deliver to one address. The caller decides what a failure means.
    pub async fn send(&self, to: &str, notification: &Notification) -> Result<(), MailError> {
        let email = self.compose(to, notification);
        match tokio::time::timeout(self.timeout, self.mailer.send(&email)).await {
            Ok(Ok(())) => {
                tracing::info!(to, kind = notification.kind(), "notification sent");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MailError::Timeout(self.timeout)),
        }
    }

    /// Deliver to every configured address. Missing addresses are skipped and
    /// failures are logged; neither stops the loop.
    pub async fn send_to_many<I>(&self, recipients: I, notification: &Notification) -> DeliveryReport
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut report = DeliveryReport::default();
        for recipient in recipients {
            let Some(to) = recipient.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) else {
                report.skipped += 1;
                continue;
            };
            match self.send(&to, notification).await {
                Ok(()) => report.delivered.push(to),
                Err(e) => {
                    tracing::warn!(to = %to, kind = notification.kind(), error = %e, "notification failed");
                    report.failed.push((to, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingMailer;
    use async_trait::async_trait;

    struct SlowMailer;

    #[async_trait]
    impl Mailer for SlowMailer {
        async fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    fn notification() -> Notification {
        Notification::SalaryValidation {
            entity_name: "Boulangerie".into(),
            message: "ok".into(),
        }
    }

    fn dispatcher(mailer: Arc<dyn Mailer>, timeout: Duration) -> NotificationDispatcher {
        NotificationDispatcher::new(mailer, "no-reply@easy-paies.fr", Some("contact@easy-paies.fr".into()), timeout)
    }

    #[tokio::test]
    async fn composes_with_sender_settings() {
        let mailer = Arc::new(RecordingMailer::new());
        let d = dispatcher(mailer.clone(), Duration::from_secs(1));
        d.send("rh@client.fr", &notification()).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "no-reply@easy-paies.fr");
        assert_eq!(sent[0].reply_to.as_deref(), Some("contact@easy-paies.fr"));
        assert_eq!(sent[0].subject, "Validation de salaire pour Boulangerie");
    }

    #[tokio::test]
    async fn slow_transport_times_out() {
        let d = dispatcher(Arc::new(SlowMailer), Duration::from_millis(20));
        let err = d.send("rh@client.fr", &notification()).await.unwrap_err();
        assert!(matches!(err, MailError::Timeout(_)));
    }

    #[tokio::test]
    async fn many_skips_missing_and_continues_after_failure() {
        let mailer = Arc::new(RecordingMailer::new());
        let d = dispatcher(mailer.clone(), Duration::from_secs(1));

        let report = d
            .send_to_many(
                [Some("a@x.fr".to_string()), None, Some("  ".to_string()), Some("b@x.fr".to_string())],
                &notification(),
            )
            .await;
        assert_eq!(report.delivered, ["a@x.fr", "b@x.fr"]);
        assert_eq!(report.skipped, 2);
        assert!(report.all_delivered());

        mailer.set_failing(true);
        let report = d
            .send_to_many([Some("a@x.fr".to_string()), Some("b@x.fr".to_string())], &notification())
            .await;
        assert_eq!(report.failed.len(), 2, "a failure does not stop the loop");
    }
}
