use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::middleware::forwarded::ForwardedHeaderError;

/// Application-wide error types with appropriate HTTP status codes.
///
/// Authentication and authorization failures are not represented here: those
/// are terminal pipeline decisions (see [`crate::policy::Denial`]), not errors.
/// `AppError` covers malformed requests, handler failures and startup problems.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed forwarding header: {0}")]
    ForwardedHeader(#[from] ForwardedHeaderError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        match &self {
            AppError::Internal(_) | AppError::ConfigError(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            _ => tracing::warn!(error = %self, "Request rejected"),
        }

        let (status, error_type, message) = match &self {
            AppError::ForwardedHeader(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    axum::Json(ErrorResponse {
                        error: "bad_request".to_string(),
                        message: "Malformed forwarding header".to_string(),
                        details: Some(e.header_name().to_string()),
                    }),
                )
                    .into_response();
            }

            // Internal errors - never expose internal details to clients
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
            ),
            AppError::NotImplemented(_) => (
                StatusCode::NOT_IMPLEMENTED,
                "not_implemented",
                "This operation is not implemented.",
            ),

            // Client errors - safe to show the message as it's user-facing
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
            details: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response = AppError::Internal("db password is hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_not_implemented_maps_to_501() {
        let response = AppError::NotImplemented("delete".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_forwarded_header_error_names_header_only() {
        let err = ForwardedHeaderError::InvalidPort {
            header: "x-forwarded-host",
            value: "example.com:http".to_string(),
        };
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Malformed forwarding header");
        assert_eq!(body["details"], "x-forwarded-host");
    }

    #[tokio::test]
    async fn test_bad_request_message_is_user_facing() {
        let response = AppError::BadRequest("segment is not base64".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], "segment is not base64");
    }
}
