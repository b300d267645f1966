use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::classifier::ProblemType;

/// Install the global Prometheus recorder
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Safe to call more than once
fn init_metric_descriptions() {
    describe_counter!(
        "api_monitor_proxy_requests_total",
        "Total number of proxied upstream calls by status class"
    );
    describe_histogram!(
        "api_monitor_upstream_latency_seconds",
        "Upstream call latency in seconds"
    );
    describe_counter!(
        "api_monitor_problems_total",
        "Total number of recorded problems by type"
    );
    describe_counter!(
        "api_monitor_problem_write_failures_total",
        "Problem records that could not be persisted"
    );
    describe_gauge!("api_monitor_info", "Build information");

    gauge!("api_monitor_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// `2xx`, `4xx`, ... or `failed` when no response was received
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "failed",
    }
}

pub fn record_upstream_call(status: u16, latency_ms: u64) {
    counter!(
        "api_monitor_proxy_requests_total",
        "status_class" => status_class(status),
    )
    .increment(1);

    histogram!("api_monitor_upstream_latency_seconds").record(latency_ms as f64 / 1000.0);
}

pub fn record_problem(problem_type: ProblemType) {
    counter!(
        "api_monitor_problems_total",
        "problem_type" => problem_type.as_str(),
    )
    .increment(1);
}

pub fn record_problem_write_failure() {
    counter!("api_monitor_problem_write_failures_total").increment(1);
}
