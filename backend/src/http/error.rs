//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::RepositoryError;
use crate::services::SchedulerError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Repository(RepositoryError),
    Scheduler(SchedulerError),
}

fn repository_response(e: &RepositoryError) -> (StatusCode, ApiError) {
    let (status, code) = match e {
        RepositoryError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        RepositoryError::ValidationError { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        RepositoryError::ConflictError { .. } => (StatusCode::CONFLICT, "CONFLICT"),
        RepositoryError::ConnectionError { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "REPOSITORY_UNAVAILABLE")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "REPOSITORY_ERROR"),
    };
    let mut body = ApiError::new(code, e.message());
    if let Some(op) = e.context().operation.as_deref() {
        body = body.with_details(format!("operation: {}", op));
    }
    (status, body)
}

fn scheduler_response(e: &SchedulerError) -> (StatusCode, ApiError) {
    let message = e.to_string();
    match e {
        SchedulerError::Busy(job) => (
            StatusCode::CONFLICT,
            ApiError::new("SCHEDULER_BUSY", message).with_details(format!("holder: {}", job)),
        ),
        SchedulerError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, ApiError::new("INVALID_REQUEST", message))
        }
        SchedulerError::InvalidState { .. } => {
            (StatusCode::CONFLICT, ApiError::new("INVALID_STATE", message))
        }
        SchedulerError::AlreadyFinalized(_) => {
            (StatusCode::CONFLICT, ApiError::new("ALREADY_FINALIZED", message))
        }
        SchedulerError::Collision(_) => (StatusCode::CONFLICT, ApiError::new("COLLISION", message)),
        SchedulerError::Configuration(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("CONFIGURATION_ERROR", message),
        ),
        SchedulerError::Repository(inner) => repository_response(inner),
        SchedulerError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("INTERNAL_ERROR", message),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Repository(e) => repository_response(&e),
            AppError::Scheduler(e) => scheduler_response(&e),
        };
        if status.is_server_error() {
            log::error!("{} {}", error.code, error.message);
        }

        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<SchedulerError> for AppError {
    fn from(err: SchedulerError) -> Self {
        AppError::Scheduler(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobId;

    #[test]
    fn test_status_mapping() {
        let busy = AppError::from(SchedulerError::Busy(JobId::generate())).into_response();
        assert_eq!(busy.status(), StatusCode::CONFLICT);

        let missing = AppError::from(RepositoryError::not_found("job x")).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let wrapped =
            AppError::from(SchedulerError::from(RepositoryError::validation("bad"))).into_response();
        assert_eq!(wrapped.status(), StatusCode::BAD_REQUEST);

        let internal = AppError::Internal("boom".into()).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
