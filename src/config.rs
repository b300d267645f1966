use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides, e.g. `API_MONITOR__SERVER__PORT=9090`
const ENV_PREFIX: &str = "API_MONITOR";

/// Legacy variable for the database location, honored over everything else
const DB_PATH_ENV: &str = "DB_PATH";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// The single upstream REST API every proxied call is forwarded to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Route segment the proxy is mounted under: `/api/{name}/*path`
    #[serde(default = "default_upstream_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bound on the whole exchange, body read included
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            name: default_upstream_name(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Calls at or above this latency are recorded as `slow_response`
    #[serde(default = "default_slow_threshold_ms")]
    pub slow_threshold_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: default_slow_threshold_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database file (default: "./api_monitor.db")
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Page size when `limit` is absent or invalid
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Larger `limit` values are clamped to this
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_upstream_name() -> String {
    "jikan".to_string()
}

fn default_base_url() -> String {
    "https://api.jikan.moe/v4".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_slow_threshold_ms() -> u64 {
    400
}

fn default_database_path() -> String {
    "./api_monitor.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_limit() -> u32 {
    100
}

fn default_max_limit() -> u32 {
    1000
}

/// Load configuration from defaults, an optional TOML file, and the environment
///
/// A missing file is not an error; the service runs on defaults alone.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .set_override_option("database.path", std::env::var(DB_PATH_ENV).ok())?
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let base_url = cfg.upstream.base_url.trim();
    if base_url.is_empty() {
        anyhow::bail!("upstream.base_url cannot be empty");
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        anyhow::bail!(
            "upstream.base_url must start with http:// or https://, got '{}'",
            base_url
        );
    }

    let name = cfg.upstream.name.trim();
    if name.is_empty() || name.contains('/') {
        anyhow::bail!("upstream.name must be a single non-empty path segment");
    }
    if matches!(name, "requests" | "problems") {
        anyhow::bail!("upstream.name '{}' collides with a built-in route", name);
    }

    if cfg.upstream.timeout_seconds == 0 {
        anyhow::bail!("upstream.timeout_seconds must be >= 1");
    }

    if cfg.monitoring.slow_threshold_ms == 0 {
        anyhow::bail!("monitoring.slow_threshold_ms must be >= 1");
    }

    if cfg.query.default_limit == 0 {
        anyhow::bail!("query.default_limit must be >= 1");
    }
    if cfg.query.max_limit < cfg.query.default_limit {
        anyhow::bail!(
            "query.max_limit ({}) must be >= query.default_limit ({})",
            cfg.query.max_limit,
            cfg.query.default_limit
        );
    }

    match cfg.server.log_format.as_str() {
        "pretty" | "json" => {}
        other => anyhow::bail!("server.log_format must be 'pretty' or 'json', got '{}'", other),
    }

    if cfg.database.path.trim().is_empty() {
        anyhow::bail!("database.path cannot be empty");
    }
    if cfg.database.max_connections == 0 {
        anyhow::bail!("database.max_connections must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.upstream.timeout_seconds, 10);
        assert_eq!(cfg.monitoring.slow_threshold_ms, 400);
        assert_eq!(cfg.query.default_limit, 100);
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut cfg = Config::default();
        cfg.upstream.base_url = "ftp://example.com".to_string();

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http://"));
    }

    #[test]
    fn test_validate_rejects_route_collision() {
        let mut cfg = Config::default();
        cfg.upstream.name = "requests".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_validate_rejects_max_limit_below_default() {
        let mut cfg = Config::default();
        cfg.query.max_limit = 10;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_limit"));
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut cfg = Config::default();
        cfg.server.log_format = "xml".to_string();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [upstream]
            base_url = "http://localhost:9000"

            [monitoring]
            slow_threshold_ms = 250
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.upstream.base_url, "http://localhost:9000");
        assert_eq!(cfg.upstream.name, "jikan");
        assert_eq!(cfg.monitoring.slow_threshold_ms, 250);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 9191\n\n[query]\ndefault_limit = 50\nmax_limit = 500"
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.server.port, 9191);
        assert_eq!(cfg.query.default_limit, 50);
        assert_eq!(cfg.query.max_limit, 500);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.upstream.base_url, "https://api.jikan.moe/v4");
    }

    #[test]
    fn test_environment_overrides_file() {
        // Only keys no other test asserts on, since the environment is process-wide
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("env.db").to_string_lossy().to_string();
        let file_path = dir.path().join("monitor.toml");
        std::fs::write(
            &file_path,
            "[monitoring]\nslow_threshold_ms = 900\n\n[upstream]\ntimeout_seconds = 7",
        )
        .unwrap();

        std::env::set_var("API_MONITOR__MONITORING__SLOW_THRESHOLD_MS", "250");
        std::env::set_var(DB_PATH_ENV, &db_path);
        let result = load_config(&file_path);
        std::env::remove_var("API_MONITOR__MONITORING__SLOW_THRESHOLD_MS");
        std::env::remove_var(DB_PATH_ENV);

        let cfg = result.unwrap();
        assert_eq!(cfg.monitoring.slow_threshold_ms, 250);
        assert_eq!(cfg.upstream.timeout_seconds, 7);
        assert_eq!(cfg.database.path, db_path);
    }
}
