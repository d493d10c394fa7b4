//! Outbound notifications (mail, SMS) behind a pluggable transport.
//!
//! Handlers never talk to a transport directly. They build a [`Notification`]
//! and hand it to a [`Dispatcher`], which sends it through the configured
//! [`Notifier`] and records the attempt in `notification_log`.

mod dispatcher;
mod log;
pub mod messages;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{NotificationChannel, RetryPolicy};
use serde::Serialize;

use crate::config::{NotificationConfig, NotificationMode};

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

/// Placeholder written to the delivery log in place of secrets.
pub const REDACTED: &str = "******";

/// A single outbound message.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub channel: NotificationChannel,
    /// Email address or mobile number.
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Substring of `body` that must not reach the delivery log.
    #[serde(skip)]
    pub redact: Option<String>,
}

impl Notification {
    pub fn new(
        channel: NotificationChannel,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            redact: None,
        }
    }

    pub fn mail(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NotificationChannel::Mail, to, subject, body)
    }

    pub fn with_redacted(mut self, secret: impl Into<String>) -> Self {
        self.redact = Some(secret.into());
        self
    }

    /// Body as it may be persisted.
    pub fn loggable_body(&self) -> String {
        match self.redact.as_deref() {
            Some(secret) if !secret.is_empty() => self.body.replace(secret, REDACTED),
            _ => self.body.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("no answer within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl NotifyError {
    /// Network failures and 5xx answers may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        match self {
            NotifyError::Transport(_) => true,
            NotifyError::Rejected { status, .. } => *status >= 500,
            NotifyError::TimedOut(_) => false,
        }
    }
}

/// A delivery transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Implementations may retry internally.
    async fn send(&self, message: &Notification) -> Result<(), NotifyError>;
}

/// Caps every send of the wrapped notifier at `limit`.
///
/// A send that overruns is abandoned and reported as [`NotifyError::TimedOut`].
pub struct TimeLimited {
    inner: Arc<dyn Notifier>,
    limit: Duration,
}

impl TimeLimited {
    pub fn new(inner: Arc<dyn Notifier>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Notifier for TimeLimited {
    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        tokio::time::timeout(self.limit, self.inner.send(message))
            .await
            .unwrap_or(Err(NotifyError::TimedOut(self.limit)))
    }
}

/// Build the notifier selected by configuration.
pub fn from_config(
    config: &NotificationConfig,
    retry: RetryPolicy,
) -> anyhow::Result<Arc<dyn Notifier>> {
    match config.mode {
        NotificationMode::Log => Ok(Arc::new(LogNotifier)),
        NotificationMode::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("notification.webhook_url is required in webhook mode"))?;
            Ok(Arc::new(WebhookNotifier::new(url, retry)?))
        }
    }
}
