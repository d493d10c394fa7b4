use async_trait::async_trait;
use tracing::info;

use super::{Notification, Notifier, NotifyError};

/// Development transport: writes messages to the log instead of sending them.
///
/// The body is logged redacted, so codes never reach log files.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        info!(
            channel = %message.channel,
            to = %message.to,
            subject = %message.subject,
            body = %message.loggable_body(),
            "Notification (log transport)"
        );
        Ok(())
    }
}
