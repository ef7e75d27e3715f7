//! Upstream database configuration types.
//!
//! Three ways to locate the database are supported, in order of precedence:
//! 1. `database_url_env` - an environment variable holding the full URL
//! 2. `database_url` - the URL itself
//! 3. Individual fields (host, port, database, username, password)

use serde::{Deserialize, Serialize};

/// Configuration for the upstream Postgres connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Environment variable name containing the PostgreSQL connection URL.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: Option<String>,

    /// Full PostgreSQL connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Hostname of the Postgres server. Individual fields are only used when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// SSL mode for the connection.
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Connection pool configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            database_url_env: default_database_url_env(),
            database_url: None,
            host: None,
            port: default_port(),
            database: default_database(),
            username: default_username(),
            password: None,
            password_env: None,
            ssl_mode: SslMode::default(),
            pool: None,
        }
    }
}

/// SSL mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    Allow,
    #[default]
    Prefer,
    Require,
    #[serde(rename = "verify-ca")]
    VerifyCa,
    #[serde(rename = "verify-full")]
    VerifyFull,
}

impl SslMode {
    /// Value of the `sslmode` connection parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Allow => "allow",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    /// Maximum number of connections shared by all requests.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout in seconds when acquiring a connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    /// How long a connection can remain idle before being closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    3
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

impl UpstreamConfig {
    /// Build a PostgreSQL connection string from this configuration.
    ///
    /// Returns `None` when nothing is configured: no URL in the environment,
    /// no direct URL and no host.
    pub fn connection_string(&self) -> Option<String> {
        if let Some(env_var) = &self.database_url_env
            && let Ok(url) = std::env::var(env_var)
            && !url.trim().is_empty()
        {
            return Some(url);
        }

        if let Some(url) = &self.database_url {
            return Some(url.clone());
        }

        let host = self.host.as_ref()?;
        let url = match self.get_password() {
            Some(password) => format!(
                "postgresql://{}:{}@{}:{}/{}?sslmode={}",
                self.username,
                password,
                host,
                self.port,
                self.database,
                self.ssl_mode.as_str()
            ),
            None => format!(
                "postgresql://{}@{}:{}/{}?sslmode={}",
                self.username,
                host,
                self.port,
                self.database,
                self.ssl_mode.as_str()
            ),
        };
        Some(url)
    }

    fn get_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env
            && let Ok(password) = std::env::var(env_var)
        {
            return Some(password);
        }
        self.password.clone()
    }

    /// Pool settings, falling back to defaults when the section is omitted.
    pub fn pool_config(&self) -> ConnectionPoolConfig {
        self.pool.clone().unwrap_or_default()
    }
}

fn default_database_url_env() -> Option<String> {
    Some("SUPABASE_DB_URL".to_string())
}

fn default_port() -> u16 {
    5432
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_username() -> String {
    "postgres".to_string()
}
