use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use elevate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route(
            "/api/requests",
            post(handlers::create_access_request_handler)
                .delete(handlers::delete_access_request_handler),
        )
        .route("/api/requests/mine", get(handlers::list_my_requests_handler))
        .route(
            "/api/requests/pending",
            get(handlers::list_pending_requests_handler),
        )
        .route(
            "/api/requests/processed",
            get(handlers::list_processed_requests_handler),
        )
        .route("/api/requests/all", get(handlers::list_all_requests_handler))
        .route(
            "/api/requests/approve",
            post(handlers::approve_access_request_handler),
        )
        .route(
            "/api/requests/reject",
            post(handlers::reject_access_request_handler),
        )
        .route("/api/federate/cli", get(handlers::federate_cli_handler))
        .route(
            "/api/federate/console",
            get(handlers::federate_console_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_claims,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
