use std::time::Duration;

use async_trait::async_trait;
use common::RetryPolicy;
use reqwest::Client;
use tracing::debug;

use super::{Notification, Notifier, NotifyError};

/// POSTs each message as JSON to a gateway that fans out to mail/SMS providers.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(url: &str, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
            retry,
        })
    }

    async fn post_once(&self, message: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(to = %message.to, "Webhook accepted notification");
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        self.retry
            .run("notification.webhook", NotifyError::is_transient, || {
                self.post_once(message)
            })
            .await
    }
}
