use elevate_core::{AppError, AppResult};
use elevate_domain::{AccessRequest, ChangeEventType, RecordImage};
use serde_json::Value;
use sqlx::{Postgres, Transaction};

fn image_json(record: Option<&AccessRequest>) -> AppResult<Option<Value>> {
    record
        .map(|record| {
            RecordImage::from_request(record)
                .map(|image| Value::Object(image.attributes().clone()))
        })
        .transpose()
}

/// Appends a change record inside the write transaction that produced it.
pub(super) async fn append_change(
    transaction: &mut Transaction<'static, Postgres>,
    event_type: ChangeEventType,
    before: Option<&AccessRequest>,
    after: Option<&AccessRequest>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO access_request_changes (event_type, before_image, after_image)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(event_type.as_str())
    .bind(image_json(before)?)
    .bind(image_json(after)?)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::StoreUnavailable(format!("failed to append change record: {error}"))
    })?;

    Ok(())
}
