pub mod health;
pub mod listings;
pub mod metrics_handler;
pub mod proxy;

use std::sync::Arc;

use crate::config::QueryConfig;
use crate::ledger::Ledger;
use crate::proxy::ProxyService;

/// Shared state for the proxy and ledger routes
#[derive(Clone)]
pub struct AppState {
    pub proxy: ProxyService,
    pub ledger: Ledger,
    pub query: QueryConfig,
    /// Route prefix of the proxy, e.g. `/api/jikan`
    pub proxy_prefix: Arc<str>,
}

impl AppState {
    pub fn new(proxy: ProxyService, query: QueryConfig, upstream_name: &str) -> Self {
        Self {
            ledger: proxy.ledger().clone(),
            proxy,
            query,
            proxy_prefix: Arc::from(proxy_prefix(upstream_name)),
        }
    }
}

pub fn proxy_prefix(upstream_name: &str) -> String {
    format!("/api/{}", upstream_name)
}
