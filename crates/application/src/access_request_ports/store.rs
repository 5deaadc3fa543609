use async_trait::async_trait;
use elevate_core::AppResult;
use elevate_domain::{AccessRequest, Condition, RecordKey, RecordUpdate, RequestStatus};

/// One page of a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of records returned.
    pub limit: usize,
    /// Key of the last record of the previous page.
    pub cursor: Option<RecordKey>,
}

impl PageRequest {
    /// Creates a request for the first page.
    #[must_use]
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }
}

/// Records returned for one page, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordPage {
    /// Records of this page.
    pub items: Vec<AccessRequest>,
    /// Cursor for the next page; `None` once the listing is exhausted.
    pub next_cursor: Option<RecordKey>,
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalWrite<T> {
    /// Condition held and the write was applied.
    Applied(T),
    /// Condition did not hold; nothing was written.
    ConditionFailed {
        /// Record as it was when the condition was evaluated.
        current: Option<AccessRequest>,
    },
}

/// Record store for access requests keyed by `(id, request_time)`.
///
/// Implementations emit a change record for every successful write, and evaluate every
/// condition atomically with the write it guards.
#[async_trait]
pub trait AccessRequestStore: Send + Sync {
    /// Returns one record.
    async fn get(&self, key: &RecordKey) -> AppResult<Option<AccessRequest>>;

    /// Writes a new record only when its key is free.
    ///
    /// An occupied key fails with the record already stored there.
    async fn insert(&self, record: AccessRequest) -> AppResult<ConditionalWrite<AccessRequest>>;

    /// Writes a whole record, replacing any existing one (last write wins).
    ///
    /// Used for promotion write-back only; new records go through `insert`.
    async fn put(&self, record: AccessRequest) -> AppResult<()>;

    /// Applies an update when the condition holds against the current record.
    async fn update_if(
        &self,
        key: &RecordKey,
        update: &RecordUpdate,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>>;

    /// Deletes a record when the condition holds, returning the deleted record.
    async fn delete_if(
        &self,
        key: &RecordKey,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>>;

    /// Lists records of one requester through the requester index.
    async fn query_by_requester(
        &self,
        requester: &str,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage>;

    /// Lists records in one status through the status index.
    async fn query_by_status(
        &self,
        status: RequestStatus,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage>;

    /// Lists every record.
    async fn scan(&self, filter: Option<&Condition>, page: PageRequest) -> AppResult<RecordPage>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> AppResult<()>;
}
