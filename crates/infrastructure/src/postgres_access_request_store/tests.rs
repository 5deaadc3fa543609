use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use elevate_application::{AccessRequestStore, ChangeFeed, ConditionalWrite, PageRequest};
use elevate_domain::{
    AccessRequest, AccessRequestInput, ChangeEventType, ChangeRecord, RecordKey, RecordUpdate,
    RequestStatus, delete_guard, review_guard, ttl_attach_guard,
};
use sqlx::migrate::Migrator;
use sqlx::{Executor, PgPool};
use sqlx::postgres::PgPoolOptions;

use super::PostgresAccessRequestStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const T0: i64 = 1_700_000_000;

/// Connects with `search_path` pinned to a fresh schema, for tests that prune the change log.
async fn isolated_pool(schema: &str) -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let admin = match PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };
    if let Err(error) = admin
        .execute(format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\"").as_str())
        .await
    {
        panic!("failed to create test schema {schema}: {error}");
    }

    let search_path = format!("SET search_path TO \"{schema}\"");
    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .after_connect(move |connection, _| {
            let search_path = search_path.clone();
            Box::pin(async move { connection.execute(search_path.as_str()).await.map(|_| ()) })
        })
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to test schema {schema}: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations in test schema {schema}: {error}");
    }

    Some(pool)
}

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres access request tests: {error}");
    }

    Some(pool)
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

fn unique(prefix: &str) -> String {
    format!(
        "{prefix}-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn request(requester: &str, account: &str, seconds: i64) -> AccessRequest {
    AccessRequest::new_request(
        requester,
        Some(format!("{requester}@example.com")),
        AccessRequestInput {
            account: account.to_owned(),
            role: "admin".to_owned(),
            duration_minutes: 60,
            justification: "incident".to_owned(),
        },
        at(seconds),
    )
    .unwrap_or_else(|_| unreachable!())
}

/// Polls until `expected` changes of `key` are visible.
///
/// Changes stay hidden while any older transaction is in flight, including ones of tests
/// running in parallel.
async fn changes_for(
    store: &PostgresAccessRequestStore,
    consumer: &str,
    key: &RecordKey,
    expected: usize,
) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    for _ in 0..50 {
        changes = store
            .poll(consumer, 10_000)
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|change| change.key().ok().as_ref() == Some(key))
            .collect::<Vec<_>>();
        if changes.len() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    changes
}

#[tokio::test]
async fn put_round_trips_and_records_insert() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let record = request(unique("alice").as_str(), "111", T0);
    assert!(store.put(record.clone()).await.is_ok());

    let loaded = store.get(record.key()).await;
    assert!(matches!(loaded, Ok(Some(ref found)) if found == &record));

    let changes = changes_for(&store, unique("consumer").as_str(), record.key(), 1).await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].event_type, ChangeEventType::Insert);
    assert!(changes[0].before.is_none());
}

#[tokio::test]
async fn approve_computes_expiration_and_clears_ttl() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let record = request(unique("alice").as_str(), "111", T0)
        .with_ttl(T0 + 86_400)
        .unwrap_or_else(|_| unreachable!());
    assert!(store.put(record.clone()).await.is_ok());

    let approve = RecordUpdate::Approve {
        reviewer: "bob".to_owned(),
        review_time: at(T0 + 60),
    };
    let outcome = store
        .update_if(record.key(), &approve, &review_guard("bob", at(T0 + 60)))
        .await;

    let Ok(ConditionalWrite::Applied(approved)) = outcome else {
        panic!("approval should apply");
    };
    assert_eq!(approved.status(), RequestStatus::Approved);
    assert_eq!(approved.expiration_time(), Some(at(T0 + 60 + 3_600)));
    assert_eq!(approved.ttl(), None);
    assert_eq!(approved.reviewer(), Some("bob"));

    let changes = changes_for(&store, unique("consumer").as_str(), record.key(), 2).await;
    assert!(matches!(changes.last(), Some(change)
        if change.event_type == ChangeEventType::Modify && change.before.is_some()));
}

#[tokio::test]
async fn failed_guard_returns_current_record_without_change() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let requester = unique("alice");
    let record = request(requester.as_str(), "111", T0)
        .with_ttl(T0 + 86_400)
        .unwrap_or_else(|_| unreachable!());
    assert!(store.put(record.clone()).await.is_ok());

    let self_review = RecordUpdate::Approve {
        reviewer: requester.clone(),
        review_time: at(T0 + 60),
    };
    let outcome = store
        .update_if(
            record.key(),
            &self_review,
            &review_guard(requester.as_str(), at(T0 + 60)),
        )
        .await;
    let reattach = store
        .update_if(
            record.key(),
            &RecordUpdate::AttachTtl { ttl: T0 },
            &ttl_attach_guard(),
        )
        .await;

    assert!(matches!(
        outcome,
        Ok(ConditionalWrite::ConditionFailed { current: Some(ref current) }) if current == &record
    ));
    assert!(matches!(
        reattach,
        Ok(ConditionalWrite::ConditionFailed { current: Some(_) })
    ));
    assert_eq!(
        changes_for(&store, unique("consumer").as_str(), record.key(), 1)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn conditional_delete_respects_owner() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let requester = unique("alice");
    let record = request(requester.as_str(), "111", T0);
    assert!(store.put(record.clone()).await.is_ok());

    let refused = store.delete_if(record.key(), &delete_guard("mallory")).await;
    let deleted = store
        .delete_if(record.key(), &delete_guard(requester.as_str()))
        .await;

    assert!(matches!(refused, Ok(ConditionalWrite::ConditionFailed { current: Some(_) })));
    assert!(matches!(deleted, Ok(ConditionalWrite::Applied(_))));
    assert!(matches!(store.get(record.key()).await, Ok(None)));

    let changes = changes_for(&store, unique("consumer").as_str(), record.key(), 2).await;
    assert!(matches!(changes.last(), Some(change)
        if change.event_type == ChangeEventType::Remove && change.after.is_none()));
}

#[tokio::test]
async fn requester_listing_pages_newest_first() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let requester = unique("alice");
    let records = (0..3)
        .map(|offset| request(requester.as_str(), "111", T0 + offset))
        .collect::<Vec<_>>();
    for record in &records {
        assert!(store.put(record.clone()).await.is_ok());
    }

    let first = store
        .query_by_requester(requester.as_str(), None, PageRequest::first(2))
        .await
        .unwrap_or_default();
    let second = store
        .query_by_requester(
            requester.as_str(),
            None,
            PageRequest {
                limit: 2,
                cursor: first.next_cursor.clone(),
            },
        )
        .await
        .unwrap_or_default();

    let ids = [first.items, second.items]
        .concat()
        .iter()
        .map(|record| record.id().to_owned())
        .collect::<Vec<_>>();
    let expected = records
        .iter()
        .rev()
        .map(|record| record.id().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(ids, expected);
    assert!(second.next_cursor.is_none());
}

#[tokio::test]
async fn acknowledge_never_moves_checkpoint_backwards() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let record = request(unique("alice").as_str(), "111", T0);
    assert!(store.put(record.clone()).await.is_ok());

    let consumer = unique("consumer");
    let mine = changes_for(&store, consumer.as_str(), record.key(), 1).await;
    let Some(insert) = mine.first() else {
        panic!("insert change should be visible");
    };

    assert!(store.acknowledge(consumer.as_str(), insert.sequence).await.is_ok());
    assert!(store.acknowledge(consumer.as_str(), 0).await.is_ok());

    assert!(
        changes_for(&store, consumer.as_str(), record.key(), 0)
            .await
            .is_empty()
    );
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
async fn insert_refuses_occupied_key_and_keeps_review() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = PostgresAccessRequestStore::new(pool);
    let record = request(unique("alice").as_str(), "111", T0)
        .with_ttl(T0 + 86_400)
        .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        store.insert(record.clone()).await,
        Ok(ConditionalWrite::Applied(_))
    ));
    let approve = RecordUpdate::Approve {
        reviewer: "bob".to_owned(),
        review_time: at(T0 + 60),
    };
    assert!(matches!(
        store
            .update_if(record.key(), &approve, &review_guard("bob", at(T0 + 60)))
            .await,
        Ok(ConditionalWrite::Applied(_))
    ));

    let again = store.insert(record.clone()).await;

    assert!(matches!(
        again,
        Ok(ConditionalWrite::ConditionFailed { current: Some(ref current) })
            if current.status() == RequestStatus::Approved
    ));
    assert!(matches!(
        store.get(record.key()).await,
        Ok(Some(ref stored)) if stored.reviewer() == Some("bob")
    ));
    let changes = changes_for(&store, unique("consumer").as_str(), record.key(), 2).await;
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].event_type, ChangeEventType::Insert);
}

#[tokio::test]
async fn acknowledged_changes_are_pruned_once_every_consumer_passed() {
    let schema = unique("elevate_prune").replace('-', "_");
    let Some(pool) = isolated_pool(schema.as_str()).await else {
        return;
    };

    let ttl = unique("ttl");
    let notifications = unique("notifications");
    let store = PostgresAccessRequestStore::new(pool.clone())
        .with_feed_consumers(vec![ttl.clone(), notifications.clone()]);
    let requester = unique("alice");
    for offset in 0..5 {
        assert!(
            store
                .put(request(requester.as_str(), "111", T0 + offset))
                .await
                .is_ok()
        );
    }

    let mut delivered = Vec::new();
    for _ in 0..50 {
        delivered = store.poll(ttl.as_str(), 100).await.unwrap_or_default();
        if delivered.len() == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(delivered.len(), 5);
    let Some(last) = delivered.last() else {
        panic!("changes should be visible");
    };
    assert!(store.acknowledge(ttl.as_str(), last.sequence).await.is_ok());
    let retained = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM access_request_changes")
        .fetch_one(&pool)
        .await
        .unwrap_or_default();
    assert_eq!(retained, 5);

    assert!(
        store
            .acknowledge(notifications.as_str(), last.sequence)
            .await
            .is_ok()
    );
    let retained = sqlx::query_scalar::<_, i64>("SELECT count(*) FROM access_request_changes")
        .fetch_one(&pool)
        .await
        .unwrap_or(-1);
    assert_eq!(retained, 0);

    if let Err(error) = pool
        .execute(format!("DROP SCHEMA \"{schema}\" CASCADE").as_str())
        .await
    {
        panic!("failed to drop test schema {schema}: {error}");
    }
}
