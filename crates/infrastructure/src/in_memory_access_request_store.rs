use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use elevate_application::{
    AccessRequestStore, ChangeFeed, ConditionalWrite, FEED_CONSUMERS, PageRequest, RecordPage,
};
use elevate_core::{AppError, AppResult};
use elevate_domain::{
    AccessRequest, ChangeEventType, ChangeRecord, Condition, RecordImage, RecordKey,
    RecordUpdate, RequestStatus,
};
use tokio::sync::RwLock;

/// In-memory record store with an ordered change feed.
///
/// Records, the change log, and consumer checkpoints share one lock, so every conditional
/// write and its change record are applied atomically. Change records acknowledged by every
/// consumer in `FEED_CONSUMERS` are dropped.
#[derive(Debug, Default)]
pub struct InMemoryAccessRequestStore {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: BTreeMap<SortKey, AccessRequest>,
    changes: Vec<ChangeRecord>,
    last_sequence: i64,
    checkpoints: HashMap<String, i64>,
}

/// Ordering key: request time first, id second, matching the listing order.
type SortKey = (String, String);

fn sort_key(key: &RecordKey) -> SortKey {
    (key.request_time.to_key_string(), key.id.clone())
}

impl InMemoryAccessRequestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreState {
    fn emit(
        &mut self,
        event_type: ChangeEventType,
        before: Option<&AccessRequest>,
        after: Option<&AccessRequest>,
    ) -> AppResult<()> {
        self.last_sequence = self.last_sequence.saturating_add(1);
        let sequence = self.last_sequence;
        let before = before.map(RecordImage::from_request).transpose()?;
        let after = after.map(RecordImage::from_request).transpose()?;

        self.changes.push(ChangeRecord {
            sequence,
            event_type,
            before,
            after,
        });
        Ok(())
    }

    fn prune_acknowledged(&mut self) {
        let floor = FEED_CONSUMERS
            .iter()
            .map(|consumer| self.checkpoints.get(*consumer).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        self.changes.retain(|change| change.sequence > floor);
    }

    fn page<F>(&self, include: F, page: PageRequest) -> RecordPage
    where
        F: Fn(&AccessRequest) -> bool,
    {
        let upper = page.cursor.as_ref().map(sort_key);
        let mut items = self
            .records
            .iter()
            .rev()
            .filter(|(key, _)| upper.as_ref().is_none_or(|upper| *key < upper))
            .map(|(_, record)| record)
            .filter(|record| include(record))
            .take(page.limit.saturating_add(1))
            .cloned()
            .collect::<Vec<_>>();

        let next_cursor = if items.len() > page.limit {
            items.truncate(page.limit);
            items.last().map(|record| record.key().clone())
        } else {
            None
        };

        RecordPage { items, next_cursor }
    }
}

fn passes(record: &AccessRequest, filter: Option<&Condition>) -> bool {
    filter.is_none_or(|condition| condition.evaluate(record))
}

#[async_trait]
impl AccessRequestStore for InMemoryAccessRequestStore {
    async fn get(&self, key: &RecordKey) -> AppResult<Option<AccessRequest>> {
        Ok(self.state.read().await.records.get(&sort_key(key)).cloned())
    }

    async fn insert(&self, record: AccessRequest) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut state = self.state.write().await;
        let key = sort_key(record.key());
        if let Some(current) = state.records.get(&key) {
            return Ok(ConditionalWrite::ConditionFailed {
                current: Some(current.clone()),
            });
        }

        state.records.insert(key, record.clone());
        state.emit(ChangeEventType::Insert, None, Some(&record))?;
        Ok(ConditionalWrite::Applied(record))
    }

    async fn put(&self, record: AccessRequest) -> AppResult<()> {
        let mut state = self.state.write().await;
        let previous = state
            .records
            .insert(sort_key(record.key()), record.clone());
        let event_type = match previous {
            Some(_) => ChangeEventType::Modify,
            None => ChangeEventType::Insert,
        };

        state.emit(event_type, previous.as_ref(), Some(&record))
    }

    async fn update_if(
        &self,
        key: &RecordKey,
        update: &RecordUpdate,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut state = self.state.write().await;
        let current = state.records.get(&sort_key(key)).cloned();

        let Some(before) = current.as_ref().filter(|record| condition.evaluate(record)) else {
            return Ok(ConditionalWrite::ConditionFailed { current });
        };

        let after = update.apply(before)?;
        state.records.insert(sort_key(key), after.clone());
        state.emit(ChangeEventType::Modify, Some(before), Some(&after))?;

        Ok(ConditionalWrite::Applied(after))
    }

    async fn delete_if(
        &self,
        key: &RecordKey,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut state = self.state.write().await;
        let holds = state
            .records
            .get(&sort_key(key))
            .is_some_and(|record| condition.evaluate(record));
        if !holds {
            return Ok(ConditionalWrite::ConditionFailed {
                current: state.records.get(&sort_key(key)).cloned(),
            });
        }

        let removed = state.records.remove(&sort_key(key)).ok_or_else(|| {
            AppError::Internal(format!("record '{}' vanished under write lock", key.id))
        })?;
        state.emit(ChangeEventType::Remove, Some(&removed), None)?;

        Ok(ConditionalWrite::Applied(removed))
    }

    async fn query_by_requester(
        &self,
        requester: &str,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        Ok(self.state.read().await.page(
            |record| record.requester() == requester && passes(record, filter),
            page,
        ))
    }

    async fn query_by_status(
        &self,
        status: RequestStatus,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        Ok(self.state.read().await.page(
            |record| record.status() == status && passes(record, filter),
            page,
        ))
    }

    async fn scan(&self, filter: Option<&Condition>, page: PageRequest) -> AppResult<RecordPage> {
        Ok(self
            .state
            .read()
            .await
            .page(|record| passes(record, filter), page))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryAccessRequestStore {
    async fn poll(&self, consumer: &str, limit: usize) -> AppResult<Vec<ChangeRecord>> {
        let state = self.state.read().await;
        let checkpoint = state.checkpoints.get(consumer).copied().unwrap_or(0);

        Ok(state
            .changes
            .iter()
            .filter(|change| change.sequence > checkpoint)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn acknowledge(&self, consumer: &str, sequence: i64) -> AppResult<()> {
        let mut state = self.state.write().await;
        let checkpoint = state.checkpoints.entry(consumer.to_owned()).or_insert(0);
        *checkpoint = (*checkpoint).max(sequence);
        state.prune_acknowledged();
        Ok(())
    }
}
