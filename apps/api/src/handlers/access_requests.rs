use elevate_domain::AccessRequest;

use super::*;

fn into_responses(records: Vec<AccessRequest>) -> Json<Vec<AccessRequestResponse>> {
    Json(
        records
            .into_iter()
            .map(AccessRequestResponse::from)
            .collect(),
    )
}

pub async fn create_access_request_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Json(payload): Json<CreateAccessRequestRequest>,
) -> ApiResult<(StatusCode, Json<AccessRequestResponse>)> {
    let record = state
        .access_request_service
        .create(&caller, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(AccessRequestResponse::from(record))))
}

pub async fn list_my_requests_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
) -> ApiResult<Json<Vec<AccessRequestResponse>>> {
    let records = state
        .access_request_service
        .list_my_requests(&caller)
        .await?;

    Ok(into_responses(records))
}

pub async fn list_pending_requests_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
) -> ApiResult<Json<Vec<AccessRequestResponse>>> {
    let records = state.access_request_service.list_pending(&caller).await?;

    Ok(into_responses(records))
}

pub async fn list_processed_requests_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
) -> ApiResult<Json<Vec<AccessRequestResponse>>> {
    let records = state.access_request_service.list_processed(&caller).await?;

    Ok(into_responses(records))
}

pub async fn list_all_requests_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
) -> ApiResult<Json<Vec<AccessRequestResponse>>> {
    let records = state.access_request_service.list_all(&caller).await?;

    Ok(into_responses(records))
}

pub async fn approve_access_request_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Json(payload): Json<RecordKeyRequest>,
) -> ApiResult<Json<AccessRequestResponse>> {
    let key = payload.into_key()?;
    let record = state
        .access_request_service
        .approve(&caller, &key)
        .await?;

    Ok(Json(AccessRequestResponse::from(record)))
}

pub async fn reject_access_request_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Json(payload): Json<RecordKeyRequest>,
) -> ApiResult<Json<AccessRequestResponse>> {
    let key = payload.into_key()?;
    let record = state.access_request_service.reject(&caller, &key).await?;

    Ok(Json(AccessRequestResponse::from(record)))
}

pub async fn delete_access_request_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Query(query): Query<RecordKeyRequest>,
) -> ApiResult<StatusCode> {
    let key = query.into_key()?;
    state.access_request_service.delete(&caller, &key).await?;

    Ok(StatusCode::NO_CONTENT)
}
