use super::*;

pub async fn federate_cli_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Query(query): Query<FederationQuery>,
) -> ApiResult<Json<CliCredentialsResponse>> {
    let credentials = state
        .federation_service
        .federate_cli(&caller, query.account.as_str(), query.role.as_str())
        .await?;

    Ok(Json(CliCredentialsResponse::from(credentials)))
}

pub async fn federate_console_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerClaims>,
    Query(query): Query<FederationQuery>,
) -> ApiResult<Json<ConsoleSigninResponse>> {
    let signin_url = state
        .federation_service
        .federate_console(&caller, query.account.as_str(), query.role.as_str())
        .await?;

    Ok(Json(ConsoleSigninResponse { signin_url }))
}
