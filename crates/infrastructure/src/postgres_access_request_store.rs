use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elevate_application::{
    AccessRequestStore, ChangeFeed, ConditionalWrite, FEED_CONSUMERS, PageRequest, RecordPage,
};
use elevate_core::{AppError, AppResult};
use elevate_domain::{
    AccessRequest, AccessRequestParts, ChangeEventType, ChangeRecord, Condition, RecordImage,
    RecordKey, RecordUpdate, RequestStatus,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

mod change_log;
mod condition_sql;

use change_log::append_change;
use condition_sql::push_condition;

const SELECT_COLUMNS: &str = "id, request_time, requester, requester_email, account, role, \
     duration_minutes, justification, status, expiration_time, review_time, reviewer, ttl";

const UPSERT_CONFLICT: &str = "ON CONFLICT (id, request_time) DO UPDATE SET \
     requester_email = EXCLUDED.requester_email, \
     duration_minutes = EXCLUDED.duration_minutes, \
     justification = EXCLUDED.justification, \
     status = EXCLUDED.status, \
     expiration_time = EXCLUDED.expiration_time, \
     review_time = EXCLUDED.review_time, \
     reviewer = EXCLUDED.reviewer, \
     ttl = EXCLUDED.ttl";

const INSERT_ONLY_CONFLICT: &str = "ON CONFLICT (id, request_time) DO NOTHING";

/// PostgreSQL-backed record store with a transactional change outbox.
///
/// Writers only lock the row they change. The change feed is ordered by writing transaction
/// id, then sequence, and only delivers rows of transactions older than every transaction
/// still in flight, so a late commit can never land behind a consumer's checkpoint.
#[derive(Clone)]
pub struct PostgresAccessRequestStore {
    pool: PgPool,
    feed_consumers: Vec<String>,
}

impl PostgresAccessRequestStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed_consumers: FEED_CONSUMERS
                .iter()
                .map(|consumer| (*consumer).to_owned())
                .collect(),
        }
    }

    /// Replaces the consumers whose checkpoints decide which change records may be pruned.
    #[must_use]
    pub fn with_feed_consumers(mut self, consumers: Vec<String>) -> Self {
        self.feed_consumers = consumers;
        self
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::StoreUnavailable(format!("failed to begin transaction: {error}"))
        })
    }

    async fn list(
        &self,
        index: Option<(&'static str, String)>,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        let limit = i64::try_from(page.limit.saturating_add(1)).map_err(|error| {
            AppError::Validation(format!("invalid page limit {}: {error}", page.limit))
        })?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SELECT_COLUMNS} FROM access_requests WHERE TRUE"
        ));
        if let Some((column, value)) = index {
            builder.push(" AND ");
            builder.push(column);
            builder.push(" = ");
            builder.push_bind(value);
        }
        if let Some(cursor) = page.cursor.as_ref() {
            builder.push(" AND (request_time, id) < (");
            builder.push_bind(cursor.request_time.to_key_string());
            builder.push(", ");
            builder.push_bind(cursor.id.clone());
            builder.push(")");
        }
        if let Some(filter) = filter {
            builder.push(" AND ");
            push_condition(&mut builder, filter);
        }
        builder.push(" ORDER BY request_time DESC, id DESC LIMIT ");
        builder.push_bind(limit);

        let rows = builder
            .build_query_as::<AccessRequestRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!("failed to list access requests: {error}"))
            })?;

        let mut items = rows
            .into_iter()
            .map(AccessRequestRow::into_request)
            .collect::<AppResult<Vec<_>>>()?;
        let next_cursor = if items.len() > page.limit {
            items.truncate(page.limit);
            items.last().map(|record| record.key().clone())
        } else {
            None
        };

        Ok(RecordPage { items, next_cursor })
    }
}

#[derive(Debug, FromRow)]
struct AccessRequestRow {
    id: String,
    request_time: String,
    requester: String,
    requester_email: Option<String>,
    account: String,
    role: String,
    duration_minutes: i32,
    justification: String,
    status: String,
    expiration_time: Option<DateTime<Utc>>,
    review_time: Option<DateTime<Utc>>,
    reviewer: Option<String>,
    ttl: Option<i64>,
}

impl AccessRequestRow {
    fn into_request(self) -> AppResult<AccessRequest> {
        let duration_minutes = u32::try_from(self.duration_minutes).map_err(|error| {
            AppError::Internal(format!(
                "stored duration_minutes {} for '{}' is invalid: {error}",
                self.duration_minutes, self.id
            ))
        })?;

        AccessRequest::from_parts(AccessRequestParts {
            status: RequestStatus::from_str(self.status.as_str())?,
            id: self.id,
            request_time: self.request_time,
            requester: self.requester,
            requester_email: self.requester_email,
            account: self.account,
            role: self.role,
            duration_minutes,
            justification: self.justification,
            expiration_time: self.expiration_time,
            review_time: self.review_time,
            reviewer: self.reviewer,
            ttl: self.ttl,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChangeRow {
    sequence: i64,
    event_type: String,
    before_image: Option<Value>,
    after_image: Option<Value>,
}

impl ChangeRow {
    fn into_change(self) -> AppResult<ChangeRecord> {
        Ok(ChangeRecord {
            sequence: self.sequence,
            event_type: ChangeEventType::parse(self.event_type.as_str())?,
            before: self.before_image.map(image_from_json).transpose()?,
            after: self.after_image.map(image_from_json).transpose()?,
        })
    }
}

fn image_from_json(value: Value) -> AppResult<RecordImage> {
    match value {
        Value::Object(attributes) => Ok(RecordImage::new(attributes)),
        other => Err(AppError::Internal(format!(
            "change image is not a JSON object: {other}"
        ))),
    }
}

async fn select_for_update(
    transaction: &mut Transaction<'static, Postgres>,
    key: &RecordKey,
) -> AppResult<Option<AccessRequest>> {
    let row = sqlx::query_as::<_, AccessRequestRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM access_requests \
         WHERE id = $1 AND request_time = $2 FOR UPDATE"
    ))
    .bind(key.id.as_str())
    .bind(key.request_time.to_key_string())
    .fetch_optional(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::StoreUnavailable(format!("failed to load access request '{}': {error}", key.id))
    })?;

    row.map(AccessRequestRow::into_request).transpose()
}

async fn write_row(
    transaction: &mut Transaction<'static, Postgres>,
    record: &AccessRequest,
    on_conflict: &str,
) -> AppResult<u64> {
    let duration_minutes = i32::try_from(record.duration_minutes())
        .map_err(|error| AppError::Validation(format!("invalid duration_minutes: {error}")))?;
    let statement = format!(
        "INSERT INTO access_requests ({SELECT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) {on_conflict}"
    );

    sqlx::query(statement.as_str())
        .bind(record.id())
        .bind(record.request_time().to_key_string())
        .bind(record.requester())
        .bind(record.requester_email())
        .bind(record.account())
        .bind(record.role())
        .bind(duration_minutes)
        .bind(record.justification())
        .bind(record.status().as_str())
        .bind(record.expiration_time())
        .bind(record.review_time())
        .bind(record.reviewer())
        .bind(record.ttl())
        .execute(&mut **transaction)
        .await
        .map(|result| result.rows_affected())
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to write access request '{}': {error}",
                record.id()
            ))
        })
}

async fn commit(transaction: Transaction<'static, Postgres>) -> AppResult<()> {
    transaction.commit().await.map_err(|error| {
        AppError::StoreUnavailable(format!("failed to commit transaction: {error}"))
    })
}

fn push_update(builder: &mut QueryBuilder<'_, Postgres>, update: &RecordUpdate) {
    match update {
        RecordUpdate::Approve {
            reviewer,
            review_time,
        } => {
            builder.push("status = 'approved', reviewer = ");
            builder.push_bind(reviewer.clone());
            builder.push(", review_time = ");
            builder.push_bind(*review_time);
            builder.push(", expiration_time = ");
            builder.push_bind(*review_time);
            builder.push(" + make_interval(mins => duration_minutes), ttl = NULL");
        }
        RecordUpdate::Reject {
            reviewer,
            review_time,
        } => {
            builder.push("status = 'rejected', reviewer = ");
            builder.push_bind(reviewer.clone());
            builder.push(", review_time = ");
            builder.push_bind(*review_time);
            builder.push(", ttl = NULL");
        }
        RecordUpdate::AttachTtl { ttl } => {
            builder.push("ttl = ");
            builder.push_bind(*ttl);
        }
    }
}

#[async_trait]
impl AccessRequestStore for PostgresAccessRequestStore {
    async fn get(&self, key: &RecordKey) -> AppResult<Option<AccessRequest>> {
        let row = sqlx::query_as::<_, AccessRequestRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM access_requests WHERE id = $1 AND request_time = $2"
        ))
        .bind(key.id.as_str())
        .bind(key.request_time.to_key_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to load access request '{}': {error}",
                key.id
            ))
        })?;

        row.map(AccessRequestRow::into_request).transpose()
    }

    async fn insert(&self, record: AccessRequest) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut transaction = self.begin().await?;
        if write_row(&mut transaction, &record, INSERT_ONLY_CONFLICT).await? == 0 {
            let current = select_for_update(&mut transaction, record.key()).await?;
            commit(transaction).await?;
            return Ok(ConditionalWrite::ConditionFailed { current });
        }

        append_change(&mut transaction, ChangeEventType::Insert, None, Some(&record)).await?;
        commit(transaction).await?;

        Ok(ConditionalWrite::Applied(record))
    }

    async fn put(&self, record: AccessRequest) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        let previous = select_for_update(&mut transaction, record.key()).await?;
        write_row(&mut transaction, &record, UPSERT_CONFLICT).await?;

        let event_type = match previous {
            Some(_) => ChangeEventType::Modify,
            None => ChangeEventType::Insert,
        };
        append_change(&mut transaction, event_type, previous.as_ref(), Some(&record)).await?;
        commit(transaction).await
    }

    async fn update_if(
        &self,
        key: &RecordKey,
        update: &RecordUpdate,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut transaction = self.begin().await?;
        let Some(before) = select_for_update(&mut transaction, key).await? else {
            return Ok(ConditionalWrite::ConditionFailed { current: None });
        };

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE access_requests SET ");
        push_update(&mut builder, update);
        builder.push(" WHERE id = ");
        builder.push_bind(key.id.clone());
        builder.push(" AND request_time = ");
        builder.push_bind(key.request_time.to_key_string());
        builder.push(" AND ");
        push_condition(&mut builder, condition);
        builder.push(format!(" RETURNING {SELECT_COLUMNS}"));

        let row = builder
            .build_query_as::<AccessRequestRow>()
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!(
                    "failed to {} access request '{}': {error}",
                    update.kind(),
                    key.id
                ))
            })?;
        let Some(row) = row else {
            return Ok(ConditionalWrite::ConditionFailed {
                current: Some(before),
            });
        };

        let after = row.into_request()?;
        append_change(
            &mut transaction,
            ChangeEventType::Modify,
            Some(&before),
            Some(&after),
        )
        .await?;
        commit(transaction).await?;

        Ok(ConditionalWrite::Applied(after))
    }

    async fn delete_if(
        &self,
        key: &RecordKey,
        condition: &Condition,
    ) -> AppResult<ConditionalWrite<AccessRequest>> {
        let mut transaction = self.begin().await?;
        let Some(before) = select_for_update(&mut transaction, key).await? else {
            return Ok(ConditionalWrite::ConditionFailed { current: None });
        };

        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM access_requests WHERE id = ");
        builder.push_bind(key.id.clone());
        builder.push(" AND request_time = ");
        builder.push_bind(key.request_time.to_key_string());
        builder.push(" AND ");
        push_condition(&mut builder, condition);

        let deleted = builder
            .build()
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::StoreUnavailable(format!(
                    "failed to delete access request '{}': {error}",
                    key.id
                ))
            })?
            .rows_affected();
        if deleted == 0 {
            return Ok(ConditionalWrite::ConditionFailed {
                current: Some(before),
            });
        }

        append_change(&mut transaction, ChangeEventType::Remove, Some(&before), None).await?;
        commit(transaction).await?;

        Ok(ConditionalWrite::Applied(before))
    }

    async fn query_by_requester(
        &self,
        requester: &str,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        self.list(Some(("requester", requester.to_owned())), filter, page)
            .await
    }

    async fn query_by_status(
        &self,
        status: RequestStatus,
        filter: Option<&Condition>,
        page: PageRequest,
    ) -> AppResult<RecordPage> {
        self.list(Some(("status", status.as_str().to_owned())), filter, page)
            .await
    }

    async fn scan(&self, filter: Option<&Condition>, page: PageRequest) -> AppResult<RecordPage> {
        self.list(None, filter, page).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|error| AppError::StoreUnavailable(format!("database unreachable: {error}")))
    }
}

#[async_trait]
impl ChangeFeed for PostgresAccessRequestStore {
    async fn poll(&self, consumer: &str, limit: usize) -> AppResult<Vec<ChangeRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid poll limit: {error}")))?;

        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT change.sequence, change.event_type, change.before_image, change.after_image
            FROM access_request_changes AS change
            LEFT JOIN change_feed_checkpoints AS checkpoint
                ON checkpoint.consumer = $1
            WHERE change.transaction_id < pg_snapshot_xmin(pg_current_snapshot())
              AND (
                  checkpoint.consumer IS NULL
                  OR (change.transaction_id, change.sequence)
                      > (checkpoint.transaction_id, checkpoint.sequence)
              )
            ORDER BY change.transaction_id, change.sequence
            LIMIT $2
            "#,
        )
        .bind(consumer)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to poll change feed: {error}"))
        })?;

        rows.into_iter().map(ChangeRow::into_change).collect()
    }

    async fn acknowledge(&self, consumer: &str, sequence: i64) -> AppResult<()> {
        let mut transaction = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO change_feed_checkpoints (consumer, transaction_id, sequence, updated_at)
            SELECT $1, transaction_id, sequence, now()
            FROM access_request_changes
            WHERE sequence = $2
            ON CONFLICT (consumer)
            DO UPDATE SET
                transaction_id = EXCLUDED.transaction_id,
                sequence = EXCLUDED.sequence,
                updated_at = now()
            WHERE (EXCLUDED.transaction_id, EXCLUDED.sequence)
                > (change_feed_checkpoints.transaction_id, change_feed_checkpoints.sequence)
            "#,
        )
        .bind(consumer)
        .bind(sequence)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!(
                "failed to acknowledge change feed sequence {sequence}: {error}"
            ))
        })?;

        let pruned = sqlx::query(
            r#"
            DELETE FROM access_request_changes
            WHERE (transaction_id, sequence) <= (
                SELECT transaction_id, sequence
                FROM change_feed_checkpoints
                WHERE consumer = ANY($1)
                ORDER BY transaction_id, sequence
                LIMIT 1
            )
            AND (
                SELECT count(*) FROM change_feed_checkpoints WHERE consumer = ANY($1)
            ) = cardinality($1)
            "#,
        )
        .bind(self.feed_consumers.clone())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::StoreUnavailable(format!("failed to prune change feed: {error}"))
        })?
        .rows_affected();

        commit(transaction).await?;
        if pruned > 0 {
            debug!(consumer, sequence, pruned, "pruned acknowledged change records");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
