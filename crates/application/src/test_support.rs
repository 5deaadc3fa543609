use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use elevate_core::{AppError, AppResult, CallerClaims};
use elevate_domain::{
    AccessRequest, ChangeEventType, ChangeRecord, Condition, RecordImage, RecordKey,
    RecordUpdate, RequestStatus,
};
use tokio::sync::Mutex;

use crate::access_request_ports::{
    AccessRequestStore, ChangeFeed, ConditionalWrite, PageRequest, RecordPage,
};
use crate::notification_ports::{NotificationChannel, NotificationMessage};

pub(crate) const T0: i64 = 1_700_000_000;

pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

pub(crate) fn alice() -> CallerClaims {
    CallerClaims::new(
        "alice",
        Some("alice@example.com".to_owned()),
        vec!["elevate-111-admin".to_owned()],
    )
}

pub(crate) fn bob() -> CallerClaims {
    CallerClaims::new("bob", None, vec!["reviewers".to_owned()])
}

pub(crate) fn auditor() -> CallerClaims {
    CallerClaims::new("carol", None, vec!["auditors".to_owned()])
}

/// Store fake with ordered keys, in-process condition evaluation, and a recorded change log.
#[derive(Default)]
pub(crate) struct FakeStore {
    records: Mutex<BTreeMap<(String, String), AccessRequest>>,
    changes: Mutex<Vec<ChangeRecord>>,
    checkpoints: Mutex<HashMap<String, i64>>,
    fail_writes: AtomicBool,
}

impl FakeStore {
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("writes disabled".to_owned()));
        }

        Ok(())
    }

    pub(crate) async fn stored(&self, key: &RecordKey) -> Option<AccessRequest> {
        self.records.lock().await.get(&sort_key(key)).cloned()
    }

    pub(crate) async fn changes(&self) -> Vec<ChangeRecord> {
        self.changes.lock().await.clone()
    }

    async fn record_change(
        &self,
        event_type: ChangeEventType,
        before: Option<&AccessRequest>,
        after: Option<&AccessRequest>,
    ) {
        let mut changes = self.changes.lock().await;
        let sequence = i64::try_from(changes.len()).unwrap_or(i64::MAX) + 1;
        changes.push(ChangeRecord {
            sequence,
            event_type,
            before: before.and_then(|record| RecordImage::from_request(record).ok()),
            after: after.and_then(|record| RecordImage::from_request(record).ok()),
        });
    }

    async fn page(&self, filter: impl Fn(&AccessRequest) -> bool, page: PageRequest) -> RecordPage {
        let records = self.records.lock().await;
        let mut matching = records
            .iter()
            .rev()
            .filter(|(key, _)| {
                page.cursor
                    .as_ref()
                    .is_none_or(|cursor| **key < sort_key(cursor))
            })
            .map(|(_, record)| record)
            .filter(|record| filter(record))
            .take(page.limit + 1)
            .cloned()
            .collect::<Vec<_>>();

        let next_cursor = if matching.len() > page.limit {
            matching.truncate(page.limit);
            matching.last().map(|record| record.key().clone())
        } else {
            None
        };

        RecordPage {
            items: matching,
            next_cursor,
        }
    }
}

fn sort_key(key: &RecordKey) -> (String, String) {
    (key.request_time.to_key_string(), key.id.clone())
}

fn matches_filter(record: &AccessRequest, filter: Option<&Condition>) -> bool {
    filter.is_none_or(|condition| condition.evaluate(record))
}

#[async_trait]
impl AccessRequestStore for FakeStore {
    async fn get(&self, key: &RecordKey) -> AppResult<Option<AccessRequest>> {
        Ok(self.stored(key).await)
    }

    async fn insert(&self, record: AccessRequest) -> AppResult<ConditionalWrite<AccessRequest>> {
        self.check_writable()?;
        let mut records = self.records.lock().await;
        if let Some(current) = records.get(&sort_key(record.key())) {
            return Ok(ConditionalWrite::ConditionFailed {
                current: Some(current.clone()),
            });
        }
        records.insert(sort_key(record.key()), record.clone());
        drop(records);

        self.record_change(ChangeEventType::Insert, None, Some(&record))
            .await;
        Ok(ConditionalWrite::Applied(record))
    }

    async fn put(&self, record: AccessRequest) -> AppResult<()> {
        self.check_writable()?;
        let previous = self
            .records
            .lock()
            .await
            .insert(sort_key(record.key()), record.clone());
        let event_type = match previous {
            Some(_) => ChangeEventType::Modify,
            None => ChangeEventType::Insert,
        };
        self.record_change(event_type, previous.as_ref(), Some(&record))
            .await;
        Ok(())
    }

    async fn update_if(
        &self,
        key: &RecordKey,
        update: &RecordUpdate,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        self.check_writable()?;
        let mut records = self.records.lock().await;
        let current = records.get(&sort_key(key)).cloned();
        let Some(before) = current.filter(|record| condition.evaluate(record)) else {
            return Ok(ConditionalWrite::ConditionFailed {
                current: records.get(&sort_key(key)).cloned(),
            });
        };

        let after = update.apply(&before)?;
        records.insert(sort_key(key), after.clone());
        drop(records);

        self.record_change(ChangeEventType::Modify, Some(&before), Some(&after))
            .await;
        Ok(ConditionalWrite::Applied(after))
    }

    async fn delete_if(
        &self,
        key: &RecordKey,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        self.check_writable()?;
        let mut records = self.records.lock().await;
        let holds = records
            .get(&sort_key(key))
            .is_some_and(|record| condition.evaluate(record));
        if !holds {
            return Ok(ConditionalWrite::ConditionFailed {
                current: records.get(&sort_key(key)).cloned(),
            });
        }

        let Some(removed) = records.remove(&sort_key(key)) else {
            return Ok(ConditionalWrite::ConditionFailed { current: None });
        };
        drop(records);

        self.record_change(ChangeEventType::Remove, Some(&removed), None)
            .await;
        Ok(ConditionalWrite::Applied(removed))
    }

    async fn query_by_requester(
        &self,
        requester: &str,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        Ok(self
            .page(
                |record| record.requester() == requester && matches_filter(record, filter),
                page,
            )
            .await)
    }

    async fn query_by_status(
        &self,
        status: RequestStatus,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        Ok(self
            .page(
                |record| record.status() == status && matches_filter(record, filter),
                page,
            )
            .await)
    }

    async fn scan(&self, filter: Option<&Condition>, page: PageRequest) -> AppResult<RecordPage> {
        Ok(self
            .page(|record| matches_filter(record, filter), page)
            .await)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChangeFeed for FakeStore {
    async fn poll(&self, consumer: &str, limit: usize) -> AppResult<Vec<ChangeRecord>> {
        let checkpoint = self
            .checkpoints
            .lock()
            .await
            .get(consumer)
            .copied()
            .unwrap_or_default();

        Ok(self
            .changes
            .lock()
            .await
            .iter()
            .filter(|change| change.sequence > checkpoint)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn acknowledge(&self, consumer: &str, sequence: i64) -> AppResult<()> {
        let mut checkpoints = self.checkpoints.lock().await;
        let checkpoint = checkpoints.entry(consumer.to_owned()).or_default();
        *checkpoint = (*checkpoint).max(sequence);
        Ok(())
    }
}

/// Notification channel fake capturing sent messages.
#[derive(Default)]
pub(crate) struct RecordingChannel {
    sent: Mutex<Vec<NotificationMessage>>,
    fail: AtomicBool,
}

impl RecordingChannel {
    pub(crate) fn failing() -> Arc<Self> {
        let channel = Self::default();
        channel.fail.store(true, Ordering::SeqCst);
        Arc::new(channel)
    }

    pub(crate) async fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, message: NotificationMessage) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("channel down".to_owned()));
        }

        self.sent.lock().await.push(message);
        Ok(())
    }
}
