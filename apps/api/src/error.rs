use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use elevate_core::AppError;
use serde::Serialize;
use tracing::error;

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    message: String,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ReviewConflict(_)
            | AppError::DeleteConflict(_)
            | AppError::DuplicateRequest(_) => StatusCode::CONFLICT,
            AppError::NoActiveGrant(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MissingBaseAttribute(_)
            | AppError::UnparsableTimestamp(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed with internal error");
            "internal server error".to_owned()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use elevate_core::AppError;

    use super::ApiError;

    fn status_of(error: AppError) -> StatusCode {
        ApiError(error).into_response().status()
    }

    #[test]
    fn lifecycle_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(AppError::Validation("bad".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Unauthorized("no".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::ReviewConflict("guard".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::DeleteConflict("guard".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::DuplicateRequest("taken".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::NoActiveGrant("none".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::StoreUnavailable("down".to_owned())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::Internal("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
