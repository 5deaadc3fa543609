use async_trait::async_trait;
use elevate_core::AppResult;
use elevate_domain::ChangeRecord;

/// Ordered, at-least-once feed of record store writes.
///
/// Each consumer keeps its own checkpoint. Records after the checkpoint are redelivered
/// until acknowledged. Feed order follows commit safety, so sequences of one batch are not
/// necessarily ascending.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Returns up to `limit` records after the consumer's checkpoint, in feed order.
    async fn poll(&self, consumer: &str, limit: usize) -> AppResult<Vec<ChangeRecord>>;

    /// Moves the consumer's checkpoint to the delivered record `sequence`, acknowledging every
    /// record delivered before it. The checkpoint never moves backwards.
    async fn acknowledge(&self, consumer: &str, sequence: i64) -> AppResult<()>;
}
