pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod metrics;
pub mod proxy;
pub mod query;
pub mod server;
pub mod signals;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ServerConfig;

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over the configured level. Can only be called once per
/// process; later calls are ignored.
pub fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if server.log_format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if let Err(e) = result {
        eprintln!("Warning: tracing already initialized: {}", e);
    }
}
