use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::entity::notification_log;

use super::{Notification, Notifier, NotifyError};

/// Sends notifications and records each attempt.
///
/// Delivery is best-effort: failures are logged and reported, never raised.
pub struct Dispatcher<'a, C: ConnectionTrait> {
    conn: &'a C,
    notifier: &'a dyn Notifier,
}

impl<'a, C: ConnectionTrait> Dispatcher<'a, C> {
    pub fn new(conn: &'a C, notifier: &'a dyn Notifier) -> Self {
        Self { conn, notifier }
    }

    /// Send one message. Returns whether the transport accepted it.
    pub async fn dispatch(&self, message: &Notification) -> bool {
        let outcome = self.notifier.send(message).await;
        self.record(message, outcome).await
    }

    /// Send many messages, `concurrency` at a time, all within `budget`.
    ///
    /// Sends still running when the budget runs out are abandoned, and
    /// messages not yet started are skipped. Both are recorded as failed.
    /// Results come back in input order.
    pub async fn dispatch_all(
        &self,
        messages: &[Notification],
        concurrency: usize,
        budget: Duration,
    ) -> Vec<bool> {
        let deadline = Instant::now() + budget;
        stream::iter(messages)
            .map(|message| async move {
                let outcome = if Instant::now() >= deadline {
                    Err(NotifyError::TimedOut(budget))
                } else {
                    tokio::time::timeout_at(deadline, self.notifier.send(message))
                        .await
                        .unwrap_or(Err(NotifyError::TimedOut(budget)))
                };
                self.record(message, outcome).await
            })
            .boxed()
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn record(&self, message: &Notification, outcome: Result<(), NotifyError>) -> bool {
        let error = match &outcome {
            Ok(()) => {
                info!(channel = %message.channel, subject = %message.subject, "Notification delivered");
                None
            }
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "Notification delivery failed");
                Some(e.to_string())
            }
        };
        let delivered = error.is_none();

        let entry = notification_log::ActiveModel {
            channel: Set(message.channel),
            recipient: Set(message.to.clone()),
            subject: Set(message.subject.clone()),
            body: Set(message.loggable_body()),
            delivered: Set(delivered),
            error: Set(error),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = entry.insert(self.conn).await {
            warn!(error = %e, "Failed to record notification");
        }

        delivered
    }
}
