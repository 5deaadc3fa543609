//! Console notification channel for development. Logs messages to tracing output.

use async_trait::async_trait;
use elevate_application::{NotificationChannel, NotificationMessage};
use elevate_core::AppResult;
use tracing::info;

/// Development notification channel that logs messages to the console.
#[derive(Clone)]
pub struct ConsoleNotificationChannel;

impl ConsoleNotificationChannel {
    /// Creates a new console notification channel.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotificationChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationChannel for ConsoleNotificationChannel {
    async fn send(&self, message: NotificationMessage) -> AppResult<()> {
        info!(
            to = %message.recipient,
            subject = %message.subject,
            idempotency_key = %message.idempotency_key,
            "--- NOTIFICATION (console) ---\nTo: {}\nSubject: {}\n\n{}\n--- END NOTIFICATION ---",
            message.recipient,
            message.subject,
            message.body
        );

        Ok(())
    }
}
