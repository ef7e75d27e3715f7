//! Secret material configuration.
//!
//! Secrets are never stored in the config file itself. Each one names an
//! environment variable and, optionally, a file to read when the variable is
//! unset (for container secret mounts).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the gateway's secrets come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Environment variable holding the shared API key callers must present.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,

    /// File holding the shared API key.
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,

    /// Environment variable holding the privileged service credential
    /// returned by `get_service_key`.
    #[serde(default = "default_service_key_env")]
    pub service_key_env: Option<String>,

    /// File holding the privileged service credential.
    #[serde(default)]
    pub service_key_file: Option<PathBuf>,

    /// Environment variable holding the originating service URL embedded in
    /// webhook events.
    #[serde(default = "default_origin_url_env")]
    pub origin_url_env: Option<String>,

    /// Originating service URL, used when the environment variable is unset.
    #[serde(default)]
    pub origin_url: Option<String>,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            api_key_file: None,
            service_key_env: default_service_key_env(),
            service_key_file: None,
            origin_url_env: default_origin_url_env(),
            origin_url: None,
        }
    }
}

impl SecretsConfig {
    /// Resolve the shared API key from environment or file.
    pub fn resolve_api_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve(self.api_key_env.as_deref(), self.api_key_file.as_ref())
    }

    /// Resolve the privileged service credential from environment or file.
    pub fn resolve_service_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve(self.service_key_env.as_deref(), self.service_key_file.as_ref())
    }

    /// Resolve the originating service URL.
    pub fn resolve_origin_url(&self) -> Option<String> {
        if let Some(env_var) = &self.origin_url_env
            && let Ok(url) = std::env::var(env_var)
            && !url.trim().is_empty()
        {
            return Some(url);
        }
        self.origin_url.clone()
    }
}

fn resolve(env_var: Option<&str>, file: Option<&PathBuf>) -> Result<Option<String>, std::io::Error> {
    if let Some(env_var) = env_var
        && let Ok(value) = std::env::var(env_var)
        && !value.trim().is_empty()
    {
        return Ok(Some(value));
    }

    if let Some(path) = file
        && path.exists()
    {
        let value = std::fs::read_to_string(path)?;
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Some(value.to_string()));
        }
    }

    Ok(None)
}

fn default_api_key_env() -> Option<String> {
    Some("MEERKATS_WEBHOOK_API_KEY".to_string())
}

fn default_service_key_env() -> Option<String> {
    Some("SUPABASE_SERVICE_ROLE_KEY".to_string())
}

fn default_origin_url_env() -> Option<String> {
    Some("SUPABASE_URL".to_string())
}
