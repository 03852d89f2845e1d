use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised inside the script store.
///
/// Security violations deliberately carry no detail; callers map them to the
/// same response as a missing file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("path escapes the store root")]
    Security,

    #[error("script not found")]
    NotFound,

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(String),
}

/// Errors returned by the JSON API handlers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            ApiError::BadRequest(r) => (StatusCode::BAD_REQUEST, r),
            ApiError::Internal(r) => (StatusCode::INTERNAL_SERVER_ERROR, r),
        };

        (status, Json(json!({ "error": reason }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_error_does_not_leak_paths() {
        let msg = StoreError::Security.to_string();
        assert!(!msg.contains('/'));
    }

    #[test]
    fn api_error_maps_status() {
        assert_eq!(
            ApiError::BadRequest("Filename required").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("Failed to save").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
