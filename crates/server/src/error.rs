use axum::{
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use services::services::{
    stale_timer_reaper::ReaperError, task_auto_creator::TaskAutoCreateError, timer::TimerError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    TaskAutoCreate(#[from] TaskAutoCreateError),
    #[error(transparent)]
    Reaper(#[from] ReaperError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Timer(err) => match err {
                TimerError::NotFound(_) => StatusCode::NOT_FOUND,
                TimerError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                TimerError::Conflict(_) => StatusCode::CONFLICT,
                TimerError::Validation(_) => StatusCode::BAD_REQUEST,
                TimerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::TaskAutoCreate(TaskAutoCreateError::OrderNotFound) => StatusCode::NOT_FOUND,
            ApiError::TaskAutoCreate(TaskAutoCreateError::Failed(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Reaper(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, ResponseJson(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_errors_map_to_http_statuses() {
        let cases = [
            (TimerError::NotFound("garment"), StatusCode::NOT_FOUND),
            (
                TimerError::PermissionDenied {
                    holder: "alice".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (TimerError::Conflict("busy".to_string()), StatusCode::CONFLICT),
            (TimerError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (
                TimerError::Database(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn auto_create_errors_map_to_http_statuses() {
        assert_eq!(
            ApiError::from(TaskAutoCreateError::OrderNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(TaskAutoCreateError::Failed(sqlx::Error::PoolTimedOut)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
