use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    classifier::Classifier,
    config::Config,
    gateway::HttpUpstream,
    handlers::{self, AppState},
    ledger::Ledger,
    metrics,
    proxy::ProxyService,
    signals::setup_signal_handlers,
};

/// Start the API monitor server
///
/// This function:
/// 1. Initializes metrics
/// 2. Opens the ledger database and runs migrations
/// 3. Sets up signal handlers for graceful shutdown
/// 4. Binds to the configured address and serves until a shutdown signal
pub async fn start_server(config: Config) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let state = build_state(&config).await?;
    let ledger = state.ledger.clone();

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let app = create_router(state, metrics_handle, &config.upstream.name);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting API monitor on {}", addr);
    info!(
        upstream = %config.upstream.base_url,
        route = %handlers::proxy_prefix(&config.upstream.name),
        slow_threshold_ms = config.monitoring.slow_threshold_ms,
        database = %config.database.path,
        "Configuration loaded"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    signal_handle.await?;
    ledger.pool().close().await;
    info!("Server stopped gracefully");

    Ok(())
}

/// Open the ledger and wire the production upstream client
pub async fn build_state(config: &Config) -> Result<AppState> {
    let ledger = Ledger::open(&config.database)
        .await
        .with_context(|| format!("Failed to open ledger database at {}", config.database.path))?;

    let upstream =
        HttpUpstream::new(&config.upstream).context("Failed to build upstream HTTP client")?;
    let proxy = ProxyService::new(
        Arc::new(upstream),
        ledger,
        Classifier::new(config.monitoring.slow_threshold_ms),
    );

    Ok(AppState::new(proxy, config.query.clone(), &config.upstream.name))
}

/// Create the Axum router with all routes and middleware
pub fn create_router(
    state: AppState,
    metrics_handle: Arc<PrometheusHandle>,
    upstream_name: &str,
) -> Router {
    let prefix = handlers::proxy_prefix(upstream_name);

    let app_routes = Router::new()
        .route(&prefix, get(handlers::proxy::forward))
        .route(&format!("{}/", prefix), get(handlers::proxy::forward))
        .route(&format!("{}/*path", prefix), get(handlers::proxy::forward))
        .route("/api/requests", get(handlers::listings::list_requests))
        .route("/api/requests/table", get(handlers::listings::requests_table))
        .route("/api/requests/csv", get(handlers::listings::requests_csv))
        .route("/api/problems", get(handlers::listings::list_problems))
        .route("/api/problems/table", get(handlers::listings::problems_table))
        .route("/api/problems/csv", get(handlers::listings::problems_csv))
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .with_state(metrics_handle)
        .merge(app_routes)
        // Request body size limit, only GETs are served
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
}
