//! Trait abstractions for the outbound notification channels.
//!
//! Delivery itself (SMTP, XMPP, HTTP retries) belongs to external daemons;
//! these traits are the hand-off points.

use std::sync::Arc;

use crate::Result;

/// Queues an HTML email.
#[allow(clippy::missing_errors_doc)]
pub trait Mailer: Send + Sync {
    fn send_email(&self, recipients: &[String], html_body: &str, subject: &str) -> Result<()>;
}

/// Queues a plain text chat message.
#[allow(clippy::missing_errors_doc)]
pub trait ChatSender: Send + Sync {
    fn send_chat_message(&self, recipients: &[String], text: &str) -> Result<()>;
}

/// Links two entities in an external system. Fire-and-forget: failures are
/// logged by the implementation and never reported back.
pub trait WebhookSink: Send + Sync {
    fn post_webhook(&self, hook: WebHook);
}

/// One web hook event, linking `left` to `right`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHook {
    pub left_type: String,
    pub left_token: String,
    pub right_type: String,
    pub right_token: String,
}

impl WebHook {
    pub fn new(
        left_type: impl Into<String>,
        left_token: impl Into<String>,
        right_type: impl Into<String>,
        right_token: impl Into<String>,
    ) -> Self {
        Self {
            left_type: left_type.into(),
            left_token: left_token.into(),
            right_type: right_type.into(),
            right_token: right_token.into(),
        }
    }
}

impl<T: Mailer + ?Sized> Mailer for Arc<T> {
    fn send_email(&self, recipients: &[String], html_body: &str, subject: &str) -> Result<()> {
        (**self).send_email(recipients, html_body, subject)
    }
}

impl<T: ChatSender + ?Sized> ChatSender for Arc<T> {
    fn send_chat_message(&self, recipients: &[String], text: &str) -> Result<()> {
        (**self).send_chat_message(recipients, text)
    }
}

impl<T: WebhookSink + ?Sized> WebhookSink for Arc<T> {
    fn post_webhook(&self, hook: WebHook) {
        (**self).post_webhook(hook);
    }
}
