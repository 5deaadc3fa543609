use std::sync::Arc;

use elevate_domain::{AccessRequest, ChangeEventType, ChangeRecord, RecordImage, RequestStatus};
use tracing::{debug, info, warn};

use crate::notification_ports::{NotificationChannel, NotificationMessage};

/// Addresses and links used in notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    /// Address or topic that receives new-request notices.
    pub reviewer_recipient: String,
    /// Dashboard link included in every message.
    pub dashboard_url: String,
}

/// What the dispatcher did with one change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// A message was handed to the channel.
    Sent,
    /// The change needs no notification or has no recipient.
    Skipped,
    /// The channel failed; the failure was logged.
    Failed,
}

/// Sends best-effort notifications for new requests and review decisions.
#[derive(Clone)]
pub struct NotificationDispatcher {
    channel: Arc<dyn NotificationChannel>,
    settings: NotificationSettings,
}

impl NotificationDispatcher {
    /// Creates a notification dispatcher.
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>, settings: NotificationSettings) -> Self {
        Self { channel, settings }
    }

    /// Dispatches the notification a change record calls for, if any. Never fails.
    pub async fn dispatch(&self, change: &ChangeRecord) -> NotificationOutcome {
        let Some(message) = self.message_for(change) else {
            return NotificationOutcome::Skipped;
        };
        let recipient = message.recipient.clone();
        let idempotency_key = message.idempotency_key.clone();

        match self.channel.send(message).await {
            Ok(()) => {
                info!(
                    sequence = change.sequence,
                    recipient = %recipient,
                    idempotency_key = %idempotency_key,
                    "notification sent"
                );
                NotificationOutcome::Sent
            }
            Err(error) => {
                warn!(
                    sequence = change.sequence,
                    recipient = %recipient,
                    error = %error,
                    "notification failed"
                );
                NotificationOutcome::Failed
            }
        }
    }

    fn message_for(&self, change: &ChangeRecord) -> Option<NotificationMessage> {
        match change.event_type {
            ChangeEventType::Insert => {
                let request = decode(change.sequence, change.after.as_ref()?)?;
                Some(self.awaiting_approval(change.sequence, &request))
            }
            ChangeEventType::Modify => {
                let before = decode(change.sequence, change.before.as_ref()?)?;
                let after = decode(change.sequence, change.after.as_ref()?)?;
                if before.status() != RequestStatus::Requested {
                    return None;
                }
                self.decision(change.sequence, &after)
            }
            ChangeEventType::Remove => None,
        }
    }

    fn awaiting_approval(&self, sequence: i64, request: &AccessRequest) -> NotificationMessage {
        NotificationMessage {
            recipient: self.settings.reviewer_recipient.clone(),
            subject: "Privileged access request awaiting approval".to_owned(),
            body: format!(
                "{} requested elevated access.\n\nSubmitted (UTC): {}\nAccount: {}\nRole: {}\n\
                 Duration: {} minutes\nJustification: {}\n\nReview it on the dashboard: {}",
                request.requester(),
                request.request_time(),
                request.account(),
                request.role(),
                request.duration_minutes(),
                request.justification(),
                self.settings.dashboard_url,
            ),
            idempotency_key: format!("{sequence}-awaiting-approval"),
        }
    }

    fn decision(&self, sequence: i64, request: &AccessRequest) -> Option<NotificationMessage> {
        let verdict = match request.status() {
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            _ => return None,
        };
        let Some(recipient) = request.requester_email() else {
            debug!(
                request_id = %request.id(),
                "requester has no email; decision notice skipped"
            );
            return None;
        };

        let reviewer = request.reviewer().unwrap_or_default();
        let closing = match request.expiration_time() {
            Some(expiration_time) => format!(
                "Your elevated access expires at {} UTC. Obtain credentials from your request \
                 dashboard: {}",
                expiration_time.format("%Y-%m-%d %H:%M:%S"),
                self.settings.dashboard_url
            ),
            None => format!(
                "Submit a new request from your dashboard: {}",
                self.settings.dashboard_url
            ),
        };

        Some(NotificationMessage {
            recipient: recipient.to_owned(),
            subject: format!("Your privileged access request has been {verdict}"),
            body: format!(
                "Your privileged access request was {verdict} by {reviewer}.\n\n\
                 Submitted (UTC): {}\nAccount: {}\nRole: {}\nDuration: {} minutes\n\n{closing}",
                request.request_time(),
                request.account(),
                request.role(),
                request.duration_minutes(),
            ),
            idempotency_key: format!("{sequence}-decision"),
        })
    }
}

fn decode(sequence: i64, image: &RecordImage) -> Option<AccessRequest> {
    match image.to_request() {
        Ok(request) => Some(request),
        Err(error) => {
            warn!(sequence, error = %error, "change image is not a valid access request");
            None
        }
    }
}
