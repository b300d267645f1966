use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application error types surfaced to HTTP clients
#[derive(Debug)]
pub enum AppError {
    /// Upstream call failed; the attempt was still logged under `request_id`
    UpstreamFetchFailed {
        message: String,
        response_time_ms: u64,
        request_id: i64,
    },
    /// Store or other internal failure
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpstreamFetchFailed { message, .. } => {
                write!(f, "Upstream fetch failed: {}", message)
            }
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::UpstreamFetchFailed {
                message,
                response_time_ms,
                request_id,
            } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": {
                        "message": "Failed to fetch from upstream API",
                        "type": error_type_name(&self),
                        "details": message,
                        "metrics": {
                            "response_time_ms": response_time_ms,
                            "request_id": request_id,
                        },
                    }
                }),
            ),
            Self::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": {
                        "message": msg,
                        "type": error_type_name(&self),
                    }
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::UpstreamFetchFailed { .. } => "upstream_fetch_failed",
        AppError::InternalError(_) => "internal_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::InternalError("disk full".to_string());
        assert_eq!(error.to_string(), "Internal error: disk full");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name(&AppError::InternalError("x".to_string())), "internal_error");
        assert_eq!(
            error_type_name(&AppError::UpstreamFetchFailed {
                message: "x".to_string(),
                response_time_ms: 1,
                request_id: 1,
            }),
            "upstream_fetch_failed"
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_response_carries_correlation() {
        let error = AppError::UpstreamFetchFailed {
            message: "connection refused".to_string(),
            response_time_ms: 12,
            request_id: 42,
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "upstream_fetch_failed");
        assert_eq!(body["error"]["details"], "connection refused");
        assert_eq!(body["error"]["metrics"]["request_id"], 42);
        assert_eq!(body["error"]["metrics"]["response_time_ms"], 12);
    }

    #[tokio::test]
    async fn test_internal_error_response() {
        let response = AppError::InternalError("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
