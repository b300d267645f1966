use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Handle /metrics endpoint
pub async fn metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        handle.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ProblemType;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[tokio::test]
    async fn test_metrics_exposes_problem_counters() {
        // Local recorder, the global one may already be taken by another test
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::with_local_recorder(&recorder, || {
            crate::metrics::record_problem(ProblemType::NotFound);
        });

        let response = metrics(State(Arc::new(handle))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            EXPOSITION_CONTENT_TYPE
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("api_monitor_problems_total"));
        assert!(text.contains("problem_type=\"not_found\""));
    }
}
