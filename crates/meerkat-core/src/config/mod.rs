//! Configuration types for the Meerkat automation gateway.
//!
//! Configuration is loaded from a single YAML file (`meerkat.yaml` by default).
//! Every section has defaults, so an absent file yields a usable configuration
//! that reads its secrets from the conventional environment variables.
//!
//! # Sections
//!
//! - **server**: listen address, port and the path of the automation endpoint
//! - **upstream**: how to reach the Postgres database and how large the pool is
//! - **secrets**: where the shared API key, service key and origin URL come from
//! - **gate**: request freshness window
//! - **observability**: default log filter

pub mod secrets;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use secrets::SecretsConfig;
pub use upstream::{ConnectionPoolConfig, SslMode, UpstreamConfig};

/// Path of the unauthenticated liveness route.
pub const HEALTH_PATH: &str = "/healthz";

/// Complete gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeerkatConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream Postgres connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Secret material resolved from the environment.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Authentication gate settings.
    #[serde(default)]
    pub gate: GateConfig,

    /// Logging defaults.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, e.g. "0.0.0.0".
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port to bind.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Path of the single automation endpoint.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            endpoint_path: default_endpoint_path(),
        }
    }
}

impl ServerConfig {
    /// `addr:port` string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

/// Authentication gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Maximum distance in milliseconds between `x-timestamp` and server time.
    /// Requests at exactly this distance are rejected.
    #[serde(default = "default_replay_window_ms")]
    pub replay_window_ms: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            replay_window_ms: default_replay_window_ms(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

fn default_endpoint_path() -> String {
    "/".to_string()
}

fn default_replay_window_ms() -> i64 {
    5 * 60 * 1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MeerkatConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. A file that exists but does not parse is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.endpoint_path.starts_with('/') {
            return Err(ConfigError::Config(format!(
                "server.endpoint_path must start with '/', got '{}'",
                self.server.endpoint_path
            )));
        }
        if self.server.endpoint_path == HEALTH_PATH {
            return Err(ConfigError::Config(format!(
                "server.endpoint_path cannot be {HEALTH_PATH}"
            )));
        }
        if self.gate.replay_window_ms <= 0 {
            return Err(ConfigError::Config(
                "gate.replay_window_ms must be positive".to_string(),
            ));
        }
        let max = self.upstream.pool_config().max_connections;
        if max == 0 {
            return Err(ConfigError::Config(
                "upstream.pool.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MeerkatConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.server.endpoint_path, "/");
        assert_eq!(config.gate.replay_window_ms, 300_000);
        assert_eq!(config.upstream.pool_config().max_connections, 3);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  listen_port: 9000
gate:
  replay_window_ms: 60000
"#;
        let config = MeerkatConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.listen_port, 9000);
        assert_eq!(config.server.listen_addr, "0.0.0.0");
        assert_eq!(config.gate.replay_window_ms, 60_000);
        assert_eq!(
            config.secrets.api_key_env.as_deref(),
            Some("MEERKATS_WEBHOOK_API_KEY")
        );
    }

    #[test]
    fn test_rejects_relative_endpoint_path() {
        let yaml = "server:\n  endpoint_path: automation\n";
        let err = MeerkatConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_pool() {
        let yaml = "upstream:\n  pool:\n    max_connections: 0\n";
        assert!(MeerkatConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = MeerkatConfig::load_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.server.listen_port, 8080);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  endpoint_path: /meerkats_automation\nupstream:\n  database_url: postgres://localhost/app"
        )
        .unwrap();

        let config = MeerkatConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.server.endpoint_path, "/meerkats_automation");
        assert_eq!(
            config.upstream.database_url.as_deref(),
            Some("postgres://localhost/app")
        );
    }
}
