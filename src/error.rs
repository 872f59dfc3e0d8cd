/// Unified error types for Driftcast
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the platform core
#[derive(Error, Debug)]
pub enum ApiError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (missing/unknown identity, bad event signature)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors (bad limit, malformed cursor, malformed event payload)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g. video already in playlist)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status plus the stable machine-readable code clients match on.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AuthenticationRequired"),
            ApiError::Authorization(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ApiError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RateLimitExceeded")
            }
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Server-side faults keep their detail in the logs, not the body
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let retry_after_secs = match &self {
            ApiError::RateLimitExceeded { retry_after } => Some(retry_after.as_secs()),
            _ => None,
        };

        let body = Json(ErrorBody {
            error: code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type alias for platform operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_detail() {
        let response = ApiError::Validation("Limit must be at least 1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_hide_their_detail() {
        let response = ApiError::Internal("pool exhausted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: std::time::Duration::from_secs(1),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from(1u64))
        );
    }
}
