//! HTTP-facing error type.
//!
//! Maps the domain error taxonomy onto status codes: validation failures
//! to 400, not-found to 404, anything else (infrastructure) to 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pscheduler_manager::ManagerError;
use pscheduler_store::StoreError;
use serde::Serialize;
use std::fmt;

/// An error ready to be turned into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A 400 for a malformed request that never reaches the store adapter
    /// (e.g. an id path segment that isn't a valid id).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// A 404 for a resource the handler looked up directly (not via the
    /// store adapter's own not-found error variants).
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "request failed");
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            Self::new(StatusCode::NOT_FOUND, e.to_string())
        } else if e.is_validation_error() {
            Self::new(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::TaskNotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            ManagerError::Store(store_err) => store_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pscheduler_core::TaskId;

    #[test]
    fn not_found_store_error_maps_to_404() {
        let err: ApiError = StoreError::TaskNotFound { id: TaskId::new() }.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn empty_field_maps_to_400() {
        let err: ApiError = StoreError::EmptyField { field: "title" }.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn manager_not_found_maps_to_404() {
        let err: ApiError = ManagerError::TaskNotFound { task_id: TaskId::new() }.into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
