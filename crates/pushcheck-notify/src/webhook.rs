//! Outbound web hook client.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::traits::{WebHook, WebhookSink};

/// Form body of a web hook POST.
#[derive(Serialize)]
struct WebHookForm<'a> {
    reason: &'static str,
    left_type: &'a str,
    left_token: &'a str,
    right_type: &'a str,
    right_token: &'a str,
}

impl<'a> From<&'a WebHook> for WebHookForm<'a> {
    fn from(hook: &'a WebHook) -> Self {
        Self {
            reason: "pushmanager",
            left_type: &hook.left_type,
            left_token: &hook.left_token,
            right_type: &hook.right_type,
            right_token: &hook.right_token,
        }
    }
}

/// Posts web hook events as form-encoded requests.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
    runtime: Handle,
}

impl WebhookClient {
    /// Client posting to `url` with a per-request `timeout`. Fire-and-forget
    /// posts are spawned onto `runtime`.
    ///
    /// # Errors
    /// Returns error if the HTTP client fails to build.
    pub fn new(url: impl Into<String>, timeout: Duration, runtime: Handle) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            runtime,
        })
    }

    /// POST one event and wait for the answer.
    ///
    /// # Errors
    /// Returns error on network failure or a non-success status.
    pub async fn post(&self, hook: &WebHook) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .form(&WebHookForm::from(hook))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(right_type = %hook.right_type, "web hook delivered");
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(Error::Webhook {
            status: status.as_u16(),
            message,
        })
    }
}

impl WebhookSink for WebhookClient {
    fn post_webhook(&self, hook: WebHook) {
        let this = self.clone();
        self.runtime.spawn(async move {
            if let Err(e) = this.post(&hook).await {
                error!(error = %e, left = %hook.left_token, right_type = %hook.right_type, "web hook POST failed");
            }
        });
    }
}
