use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Errors surfaced by the HTTP API.
///
/// Every variant renders as `{"detail": "<message>"}` with the status code
/// returned by [`ApiError::status_code`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database not configured")]
    NotConfigured,

    #[error("Invalid evaluation id")]
    InvalidId,

    #[error("Evaluation not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    /// Upstream document could not be fetched
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotConfigured | Self::Internal(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidId => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotConfigured.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::InvalidId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::BadGateway("x".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::NotConfigured.to_string(), "Database not configured");
        assert_eq!(ApiError::InvalidId.to_string(), "Invalid evaluation id");
        assert_eq!(ApiError::NotFound.to_string(), "Evaluation not found");
    }
}
