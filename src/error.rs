//! Error types and HTTP response conversion.
//!
//! All errors are automatically converted to appropriate HTTP responses
//! with JSON error bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Gateway error types with automatic HTTP status code mapping.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] reqwest::Error),

    #[error("backend did not answer in time")]
    BackendTimeout,

    #[error("backend error ({error_type}): {message}")]
    Backend { error_type: String, message: String },

    #[error("invalid backend response: {0}")]
    InvalidBackendResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] sonic_rs::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::BackendTimeout
        } else {
            GatewayError::BackendUnavailable(err)
        }
    }
}

impl GatewayError {
    /// HTTP status reported to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Config(_) | GatewayError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            GatewayError::BackendUnavailable(_) | GatewayError::InvalidBackendResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Backend { error_type, .. } => match error_type.as_str() {
                "bad_data" => StatusCode::BAD_REQUEST,
                "timeout" => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn backend(error_type: &str) -> GatewayError {
        GatewayError::Backend {
            error_type: error_type.to_string(),
            message: "query failed".to_string(),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = GatewayError::Config("missing port".to_string());
        assert_eq!(err.to_string(), "configuration error: missing port");
    }

    #[test]
    fn test_backend_error_display() {
        let err = backend("execution");
        assert_eq!(err.to_string(), "backend error (execution): query failed");
    }

    #[test]
    fn test_backend_timeout_response_status() {
        let response = GatewayError::BackendTimeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_not_acceptable_response_status() {
        let err = GatewayError::NotAcceptable("application/xml".to_string());
        assert_eq!(err.into_response().status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_invalid_backend_response_status() {
        let err = GatewayError::InvalidBackendResponse("truncated".to_string());
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_backend_error_type_mapping() {
        assert_eq!(backend("bad_data").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(backend("timeout").status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(backend("execution").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(backend("internal").status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_error_response_body_format() {
        let response = backend("bad_data").into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();
        assert!(body_str.contains("\"error\""));
        assert!(body_str.contains("query failed"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_unavailable() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();
        let gateway_err = GatewayError::from(err);
        assert!(matches!(gateway_err, GatewayError::BackendUnavailable(_)));
        assert_eq!(gateway_err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
