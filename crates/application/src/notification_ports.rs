use async_trait::async_trait;
use elevate_core::AppResult;

/// Outbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    /// Address or topic the message goes to.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Stable key for dropping redelivered duplicates.
    pub idempotency_key: String,
}

/// Fire-and-forget notification channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Sends one message.
    async fn send(&self, message: NotificationMessage) -> AppResult<()>;
}
