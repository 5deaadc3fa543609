use std::sync::Arc;

use elevate_core::AppResult;
use elevate_domain::ChangeRecord;
use tracing::{debug, warn};

use crate::access_request_ports::ChangeFeed;
use crate::notification_dispatcher::NotificationDispatcher;
use crate::ttl_assignment_service::TtlAssignmentService;

/// Checkpoint name of the ttl trigger.
pub const TTL_CONSUMER: &str = "ttl-assignment";

/// Checkpoint name of the notification dispatcher.
pub const NOTIFICATION_CONSUMER: &str = "notifications";

/// Every consumer the processor runs; stores may drop records all of them acknowledged.
pub const FEED_CONSUMERS: [&str; 2] = [TTL_CONSUMER, NOTIFICATION_CONSUMER];

/// Number of change records each consumer handled in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessedCounts {
    /// Records handled by the ttl trigger.
    pub ttl: usize,
    /// Records handled by the notification dispatcher.
    pub notifications: usize,
}

impl ProcessedCounts {
    /// Returns whether the pass found nothing to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ttl == 0 && self.notifications == 0
    }
}

/// Drives the ttl trigger and notification dispatch from the change feed.
///
/// Each consumer acknowledges only records it finished. A retryable store failure stops the
/// ttl batch before the failing record, so the feed redelivers it on the next pass.
#[derive(Clone)]
pub struct ChangeFeedProcessor {
    feed: Arc<dyn ChangeFeed>,
    ttl_assignment: TtlAssignmentService,
    notifications: NotificationDispatcher,
    batch_size: usize,
}

impl ChangeFeedProcessor {
    /// Creates a processor reading up to `batch_size` records per consumer and pass.
    #[must_use]
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        ttl_assignment: TtlAssignmentService,
        notifications: NotificationDispatcher,
        batch_size: usize,
    ) -> Self {
        Self {
            feed,
            ttl_assignment,
            notifications,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs one batch for each consumer.
    ///
    /// Both consumers run even when the first fails; the first error is returned.
    pub async fn run_once(&self) -> AppResult<ProcessedCounts> {
        let ttl = self.process_ttl_batch().await;
        let notifications = self.process_notification_batch().await;

        Ok(ProcessedCounts {
            ttl: ttl?,
            notifications: notifications?,
        })
    }

    /// Runs the ttl trigger over the next batch.
    pub async fn process_ttl_batch(&self) -> AppResult<usize> {
        let changes = self.feed.poll(TTL_CONSUMER, self.batch_size).await?;
        let mut handled = 0;
        let mut failure = None;

        for change in &changes {
            match self.ttl_assignment.process(change).await {
                Ok(outcome) => {
                    debug!(sequence = change.sequence, ?outcome, "ttl trigger handled change");
                }
                Err(error) if error.is_retryable() => {
                    warn!(
                        sequence = change.sequence,
                        error = %error,
                        "ttl trigger failed, change will be redelivered"
                    );
                    failure = Some(error);
                    break;
                }
                Err(error) => {
                    warn!(
                        sequence = change.sequence,
                        error = %error,
                        "ttl trigger failed permanently, dropping change"
                    );
                }
            }
            handled += 1;
        }

        self.acknowledge(TTL_CONSUMER, &changes[..handled]).await?;
        match failure {
            Some(error) => Err(error),
            None => Ok(handled),
        }
    }

    /// Runs notification dispatch over the next batch.
    pub async fn process_notification_batch(&self) -> AppResult<usize> {
        let changes = self.feed.poll(NOTIFICATION_CONSUMER, self.batch_size).await?;

        for change in &changes {
            let outcome = self.notifications.dispatch(change).await;
            debug!(sequence = change.sequence, ?outcome, "notification dispatcher handled change");
        }

        self.acknowledge(NOTIFICATION_CONSUMER, &changes).await?;
        Ok(changes.len())
    }

    /// Acknowledges the last of `handled`, which covers every record delivered before it.
    async fn acknowledge(&self, consumer: &str, handled: &[ChangeRecord]) -> AppResult<()> {
        match handled.last() {
            Some(change) => self.feed.acknowledge(consumer, change.sequence).await,
            None => Ok(()),
        }
    }
}
