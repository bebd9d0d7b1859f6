use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::application::AppError;

/// Wraps [`AppError`] so the handlers can use `?` and still produce the
/// JSON error contract: every failure body carries an `error` string, the
/// insufficient-balance case additionally echoes the diagnostic amounts.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidRequest(_) | AppError::InsufficientBalance { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::CardNotFound(_) | AppError::StationNotFound(_) | AppError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Configuration | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self.0, "request failed");
        }

        let body = match &self.0 {
            AppError::InsufficientBalance {
                current_balance,
                requested_quantity,
            } => json!({
                "error": self.0.to_string(),
                "current_balance": current_balance,
                "requested_quantity": requested_quantity,
            }),
            _ => json!({ "error": self.0.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
