//! Upstream gateway
//!
//! One outbound call per proxied request, timed from send to full body read.
//! The orchestrator only sees the [`UpstreamClient`] trait, so tests swap the
//! reqwest transport for a scripted double.

mod http;

pub use http::HttpUpstream;

use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;

/// The only verb this proxy forwards
pub const PROXY_METHOD: &str = "GET";

/// Why an upstream call did not produce a usable response
///
/// Kept apart from [`Outcome::status`] so a transport failure (status 0) and
/// a malformed 2xx body (real status) are logged differently.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("failed to make request: {0}")]
    Transport(String),

    #[error("failed to read response body: {0}")]
    BodyRead(String),

    #[error("invalid JSON response: {0}")]
    InvalidPayload(String),
}

/// Result descriptor of a single upstream call
#[derive(Debug)]
pub struct Outcome {
    /// Upstream-relative path, leading slash included
    pub path: String,
    /// HTTP status, or 0 when no response was received
    pub status: u16,
    /// Wall-clock time until the body was read or the failure was observed
    pub latency_ms: u64,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub error: Option<FetchError>,
}

impl Outcome {
    /// Successful exchange; a 2xx body is validated before this is considered a success
    pub fn completed(
        path: String,
        status: u16,
        latency_ms: u64,
        body: Vec<u8>,
        content_type: Option<String>,
    ) -> Self {
        let error = validate_payload(status, &body).err();
        Self {
            path,
            status,
            latency_ms,
            body,
            content_type,
            error,
        }
    }

    pub fn failed(path: String, status: u16, latency_ms: u64, error: FetchError) -> Self {
        Self {
            path,
            status,
            latency_ms,
            body: Vec::new(),
            content_type: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// False when the call never got as far as a status line
    pub fn received_response(&self) -> bool {
        self.status != 0
    }
}

#[async_trait]
pub trait UpstreamClient: Send + Sync + 'static {
    /// Perform one call against the upstream. Never retries.
    async fn fetch(&self, path: &str) -> Outcome;
}

/// `""` becomes `/`, and a missing leading slash is added
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// 2xx bodies must be well-formed JSON; other statuses pass through untouched
pub fn validate_payload(status: u16, body: &[u8]) -> Result<(), FetchError> {
    if !(200..300).contains(&status) {
        return Ok(());
    }
    serde_json::from_slice::<serde::de::IgnoredAny>(body)
        .map(|_| ())
        .map_err(|e| FetchError::InvalidPayload(e.to_string()))
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("anime/1"), "/anime/1");
        assert_eq!(normalize_path("/anime/1?q=x"), "/anime/1?q=x");
    }

    #[test]
    fn test_validate_payload_only_checks_2xx() {
        assert!(validate_payload(200, br#"{"data":{"mal_id":1}}"#).is_ok());
        assert!(validate_payload(204, b"").is_err());
        assert!(validate_payload(200, b"<html>").is_err());
        assert!(validate_payload(404, b"<html>not found</html>").is_ok());
        assert!(validate_payload(500, b"").is_ok());
    }

    #[test]
    fn test_completed_with_malformed_body_keeps_status() {
        let outcome = Outcome::completed("/x".to_string(), 200, 35, b"not json".to_vec(), None);
        assert!(outcome.is_failure());
        assert!(outcome.received_response());
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.latency_ms, 35);
        assert!(matches!(outcome.error, Some(FetchError::InvalidPayload(_))));
    }

    #[test]
    fn test_failed_has_no_body() {
        let outcome = Outcome::failed(
            "/x".to_string(),
            0,
            8,
            FetchError::Transport("connection refused".to_string()),
        );
        assert!(outcome.is_failure());
        assert!(!outcome.received_response());
        assert!(outcome.body.is_empty());
    }
}
