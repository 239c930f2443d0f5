//! # pushcheck-notify
//!
//! Notification adapters for pushcheck: message templates, a JSON lines
//! outbox for the external email and chat daemons, and a fire-and-forget
//! web hook client.

mod error;
mod message;
mod notifier;
mod outbox;
mod traits;
mod webhook;

pub use error::{Error, Result};
pub use message::{Email, Links, MessageFormatter};
pub use notifier::MessageNotifier;
pub use outbox::{MessageKind, Outbox, OutboxEntry};
pub use traits::{ChatSender, Mailer, WebHook, WebhookSink};
pub use webhook::WebhookClient;
