//! File-backed outbox for email and chat messages.
//!
//! Every message is appended as one JSON line. External delivery daemons
//! tail the file; pushcheck never talks SMTP or XMPP itself.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::traits::{ChatSender, Mailer};

/// Channel a queued message is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Email,
    Chat,
}

/// One line of the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub kind: MessageKind,
    pub recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

/// Append-only JSON lines outbox.
#[derive(Debug)]
pub struct Outbox {
    path: PathBuf,
    default_domain: String,
    write_lock: Mutex<()>,
}

impl Outbox {
    /// Outbox at `path`; bare email recipients get `@default_domain`.
    pub fn new(path: impl Into<PathBuf>, default_domain: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            default_domain: default_domain.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn qualify(&self, user: &str) -> String {
        if user.contains('@') {
            user.to_string()
        } else {
            format!("{user}@{}", self.default_domain)
        }
    }

    fn append(&self, entry: &OutboxEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        debug!(kind = ?entry.kind, recipients = ?entry.recipients, "message queued");
        Ok(())
    }

    /// Read back every queued message.
    ///
    /// # Errors
    /// Returns error if the file can't be read or a line is malformed.
    pub fn entries(&self) -> Result<Vec<OutboxEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&self.path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}

impl Mailer for Outbox {
    fn send_email(&self, recipients: &[String], html_body: &str, subject: &str) -> Result<()> {
        self.append(&OutboxEntry {
            kind: MessageKind::Email,
            recipients: recipients.iter().map(|r| self.qualify(r)).collect(),
            subject: Some(subject.to_string()),
            body: html_body.to_string(),
            queued_at: Utc::now(),
        })
    }
}

impl ChatSender for Outbox {
    fn send_chat_message(&self, recipients: &[String], text: &str) -> Result<()> {
        self.append(&OutboxEntry {
            kind: MessageKind::Chat,
            recipients: recipients.to_vec(),
            subject: None,
            body: text.to_string(),
            queued_at: Utc::now(),
        })
    }
}
