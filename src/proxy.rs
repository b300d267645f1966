//! Proxy orchestration
//!
//! Fetch, log the call, classify, log the problem, answer. The call record is
//! the primary write and its failure fails the request. The problem record is
//! a non-critical side effect: a failure is logged and counted, never
//! surfaced to the client.

use std::sync::Arc;

use crate::classifier::{Classifier, DetectedProblem};
use crate::error::AppError;
use crate::gateway::{Outcome, UpstreamClient, PROXY_METHOD};
use crate::ledger::{Ledger, NewCall};
use crate::metrics;

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// What the client gets back on a successful proxy call
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone)]
pub struct ProxyService {
    upstream: Arc<dyn UpstreamClient>,
    ledger: Ledger,
    classifier: Classifier,
}

impl ProxyService {
    pub fn new(upstream: Arc<dyn UpstreamClient>, ledger: Ledger, classifier: Classifier) -> Self {
        Self {
            upstream,
            ledger,
            classifier,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Forward one call to the upstream, recording it and any problem it shows
    pub async fn handle(&self, path: &str) -> Result<ProxyResponse, AppError> {
        let outcome = self.upstream.fetch(path).await;
        metrics::record_upstream_call(outcome.status, outcome.latency_ms);

        let request_id = self
            .ledger
            .insert_call(&NewCall {
                method: PROXY_METHOD.to_string(),
                path: outcome.path.clone(),
                status: outcome.status,
                latency_ms: outcome.latency_ms,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    path = %outcome.path,
                    status = outcome.status,
                    latency_ms = outcome.latency_ms,
                    error = %e,
                    "Failed to record upstream call"
                );
                AppError::InternalError(format!("Failed to record request: {}", e))
            })?;

        if let Some(problem) = self.classifier.classify(outcome.status, outcome.latency_ms) {
            self.record_problem_best_effort(request_id, &problem).await;
        }

        respond(request_id, outcome)
    }

    /// Non-critical side effect: never fails, never blocks the response on error
    async fn record_problem_best_effort(&self, request_id: i64, problem: &DetectedProblem) {
        match self.ledger.insert_problem(request_id, problem).await {
            Ok(problem_id) => {
                metrics::record_problem(problem.problem_type);
                tracing::info!(
                    request_id,
                    problem_id,
                    problem_type = %problem.problem_type,
                    "Problem detected"
                );
            }
            Err(e) => {
                metrics::record_problem_write_failure();
                tracing::warn!(
                    request_id,
                    problem_type = %problem.problem_type,
                    error = %e,
                    "Failed to record problem"
                );
            }
        }
    }
}

fn respond(request_id: i64, outcome: Outcome) -> Result<ProxyResponse, AppError> {
    if let Some(error) = outcome.error {
        tracing::warn!(
            request_id,
            path = %outcome.path,
            status = outcome.status,
            latency_ms = outcome.latency_ms,
            error = %error,
            "Upstream fetch failed"
        );
        return Err(AppError::UpstreamFetchFailed {
            message: error.to_string(),
            response_time_ms: outcome.latency_ms,
            request_id,
        });
    }

    tracing::info!(
        request_id,
        path = %outcome.path,
        status = outcome.status,
        latency_ms = outcome.latency_ms,
        "Proxied upstream call"
    );

    Ok(ProxyResponse {
        status: outcome.status,
        body: outcome.body,
        content_type: outcome
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
    })
}
