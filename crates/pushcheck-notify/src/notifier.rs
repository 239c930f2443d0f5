//! Dispatches job outcomes to email, chat and web hooks.

use pushcheck_core::{Notifier, Outcome, PushRequest};
use tracing::{error, warn};

use crate::message::MessageFormatter;
use crate::traits::{ChatSender, Mailer, WebHook, WebhookSink};

/// [`Notifier`] that formats messages and hands them to the channels.
///
/// Holds no state beyond its collaborators and never retries.
pub struct MessageNotifier<M, C, W> {
    formatter: MessageFormatter,
    mailer: M,
    chat: C,
    webhooks: Option<W>,
}

impl<M, C, W> MessageNotifier<M, C, W>
where
    M: Mailer,
    C: ChatSender,
    W: WebhookSink,
{
    /// Web hooks are skipped when `webhooks` is `None`.
    pub const fn new(formatter: MessageFormatter, mailer: M, chat: C, webhooks: Option<W>) -> Self {
        Self {
            formatter,
            mailer,
            chat,
            webhooks,
        }
    }

    fn post_verified_hooks(&self, request: &PushRequest) {
        let Some(sink) = &self.webhooks else {
            return;
        };
        let id = request.id.to_string();
        sink.post_webhook(WebHook::new("pushrequest", &id, "ref", &request.branch));
        sink.post_webhook(WebHook::new(
            "pushrequest",
            &id,
            "commit",
            request.revision.as_str(),
        ));
        if let Some(review) = request.reviewid.as_deref().filter(|r| !r.is_empty()) {
            sink.post_webhook(WebHook::new("pushrequest", &id, "review", review));
        }
    }
}

impl<M, C, W> Notifier for MessageNotifier<M, C, W>
where
    M: Mailer,
    C: ChatSender,
    W: WebhookSink,
{
    fn notify(&self, request: &PushRequest, outcome: &Outcome) {
        let recipients = request.recipients();

        match self.formatter.email(request, outcome) {
            Ok(email) => {
                if let Err(e) = self.mailer.send_email(&recipients, &email.html, &email.subject) {
                    error!(request = %request.id, error = %e, "failed to queue email");
                }
            }
            Err(e) => error!(request = %request.id, error = %e, "failed to render email"),
        }

        match self.formatter.chat(request, outcome) {
            Ok(Some(text)) => {
                if let Err(e) = self.chat.send_chat_message(&recipients, &text) {
                    warn!(request = %request.id, error = %e, "failed to queue chat message");
                }
            }
            Ok(None) => {}
            Err(e) => error!(request = %request.id, error = %e, "failed to render chat message"),
        }

        if !outcome.is_failure() {
            self.post_verified_hooks(request);
        }
    }
}
