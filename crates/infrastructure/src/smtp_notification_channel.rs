//! SMTP notification channel using the `lettre` crate.

use async_trait::async_trait;
use elevate_application::{NotificationChannel, NotificationMessage};
use elevate_core::{AppError, AppResult};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP notification channel configuration.
#[derive(Clone)]
pub struct SmtpNotificationConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
}

impl std::fmt::Debug for SmtpNotificationConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SmtpNotificationConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Production notification channel delivering plain-text email over SMTP.
#[derive(Clone)]
pub struct SmtpNotificationChannel {
    config: SmtpNotificationConfig,
}

impl SmtpNotificationChannel {
    /// Creates a new SMTP notification channel.
    #[must_use]
    pub fn new(config: SmtpNotificationConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, message: NotificationMessage) -> AppResult<Message> {
        let from = self
            .config
            .from_address
            .parse()
            .map_err(|error| AppError::Internal(format!("invalid from address: {error}")))?;

        let to = message
            .recipient
            .parse()
            .map_err(|error| AppError::Internal(format!("invalid recipient address: {error}")))?;

        // Receiving servers collapse redelivered duplicates on Message-ID.
        let domain = self
            .config
            .from_address
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain);

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject)
            .message_id(Some(format!("<{}@{domain}>", message.idempotency_key)))
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .map_err(|error| AppError::Internal(format!("failed to build email: {error}")))
    }
}

#[async_trait]
impl NotificationChannel for SmtpNotificationChannel {
    async fn send(&self, message: NotificationMessage) -> AppResult<()> {
        let message = self.build_message(message)?;

        let credentials =
            Credentials::new(self.config.username.clone(), self.config.password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
            .map_err(|error| {
                AppError::Internal(format!("failed to create SMTP transport: {error}"))
            })?
            .port(self.config.port)
            .credentials(credentials)
            .build();

        mailer
            .send(message)
            .await
            .map_err(|error| AppError::Internal(format!("failed to send email: {error}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use elevate_application::NotificationMessage;

    use super::{SmtpNotificationChannel, SmtpNotificationConfig};

    fn channel() -> SmtpNotificationChannel {
        SmtpNotificationChannel::new(SmtpNotificationConfig {
            host: "smtp.example.com".to_owned(),
            port: 587,
            username: "elevate".to_owned(),
            password: "secret".to_owned(),
            from_address: "elevate@example.com".to_owned(),
        })
    }

    fn message(recipient: &str) -> NotificationMessage {
        NotificationMessage {
            recipient: recipient.to_owned(),
            subject: "Privileged access request awaiting approval".to_owned(),
            body: "alice requested admin in 111".to_owned(),
            idempotency_key: "7-awaiting-approval".to_owned(),
        }
    }

    #[test]
    fn message_id_carries_idempotency_key() {
        let built = channel()
            .build_message(message("reviewers@example.com"))
            .unwrap_or_else(|_| unreachable!());
        let raw = String::from_utf8(built.formatted()).unwrap_or_default();

        assert!(raw.contains("Message-ID: <7-awaiting-approval@example.com>"));
        assert!(raw.contains("To: reviewers@example.com"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        assert!(channel().build_message(message("not an address")).is_err());
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", channel().config);

        assert!(rendered.contains("smtp.example.com"));
        assert!(!rendered.contains("secret"));
    }
}
