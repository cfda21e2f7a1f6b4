use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_SERVER_ERROR_MESSAGE,
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Maps a store error to an opaque response. Only "not found" is surfaced;
/// everything else, including pool timeouts and SQL errors, becomes a 500.
pub fn map_db_error(err: sqlx::Error) -> AppError {
    let status = match &err {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    tracing::error!(error = %err, status = %status, "database error");

    match status {
        StatusCode::NOT_FOUND => AppError::not_found("Resource not found"),
        _ => AppError::internal(),
    }
}
