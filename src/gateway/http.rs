use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::{Duration, Instant};

use super::{elapsed_ms, normalize_path, FetchError, Outcome, UpstreamClient};
use crate::config::UpstreamConfig;

/// reqwest-backed upstream with a fixed base URL and per-call timeout
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, &config.base_url, timeout))
    }

    pub fn with_client(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn fetch(&self, path: &str) -> Outcome {
        let path = normalize_path(path);
        let url = self.url_for(&path);
        let started = Instant::now();

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                let latency_ms = elapsed_ms(started);
                tracing::debug!(url = %url, error = %e, latency_ms, "Upstream request failed");
                return Outcome::failed(path, 0, latency_ms, fetch_error(e, latency_ms));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(body) => Outcome::completed(
                path,
                status,
                elapsed_ms(started),
                body.to_vec(),
                content_type,
            ),
            Err(e) => {
                let latency_ms = elapsed_ms(started);
                let error = if e.is_timeout() {
                    FetchError::Timeout(latency_ms)
                } else {
                    FetchError::BodyRead(e.to_string())
                };
                Outcome::failed(path, status, latency_ms, error)
            }
        }
    }
}

fn fetch_error(err: reqwest::Error, latency_ms: u64) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(latency_ms)
    } else {
        FetchError::Transport(err.to_string())
    }
}
