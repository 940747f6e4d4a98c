//! Server configuration management

use std::path::PathBuf;
use std::time::Duration;

use folio::{JupyterExecutor, RemoteConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Root of the local notebook tree
    pub notebooks_dir: PathBuf,

    /// Directory holding the `*.j2` document templates
    pub templates_dir: PathBuf,

    /// Directory rendered documents are written to
    pub output_dir: PathBuf,

    /// Directory searched for `<name>.html.j2` export templates before the
    /// built-in ones
    pub export_templates_dir: Option<PathBuf>,

    /// Token for the repository contents API
    #[serde(skip_serializing)]
    pub github_token: Option<String>,

    pub github_api_url: String,

    pub github_raw_url: String,

    /// Timeout for remote requests in seconds
    pub http_timeout_seconds: u64,

    /// Per-cell execution timeout in seconds
    pub execute_timeout_seconds: u64,

    /// Explicit `jupyter` binary; looked up on PATH when unset
    pub jupyter_bin: Option<PathBuf>,

    /// CSS applied when a render request carries none
    pub default_css: String,

    /// CORS allowed origins
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid PORT value".to_string()))?,
            notebooks_dir: env_path("NOTEBOOKS_DIR").unwrap_or(defaults.notebooks_dir),
            templates_dir: env_path("TEMPLATES_DIR").unwrap_or(defaults.templates_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            export_templates_dir: env_path("EXPORT_TEMPLATES_DIR"),
            github_token: env_non_empty("GITHUB_TOKEN"),
            github_api_url: std::env::var("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_raw_url: std::env::var("GITHUB_RAW_URL").unwrap_or(defaults.github_raw_url),
            http_timeout_seconds: std::env::var("HTTP_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid HTTP_TIMEOUT_SECONDS value".to_string()))?,
            execute_timeout_seconds: std::env::var("EXECUTE_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutes per cell
                .parse()
                .map_err(|_| {
                    ApiError::Config("Invalid EXECUTE_TIMEOUT_SECONDS value".to_string())
                })?,
            jupyter_bin: env_path("JUPYTER_BIN"),
            default_css: std::env::var("DEFAULT_CSS").unwrap_or_default(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Settings for the remote notebook source
    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            api_base: self.github_api_url.trim_end_matches('/').to_string(),
            raw_base: self.github_raw_url.trim_end_matches('/').to_string(),
            token: self.github_token.clone(),
            timeout: Duration::from_secs(self.http_timeout_seconds),
        }
    }

    /// Kernel executor honouring the configured binary and cell timeout
    pub fn executor(&self) -> JupyterExecutor {
        let executor =
            JupyterExecutor::new().with_cell_timeout(Duration::from_secs(self.execute_timeout_seconds));
        match &self.jupyter_bin {
            Some(program) => executor.with_program(program.clone()),
            None => executor,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            notebooks_dir: PathBuf::from("notebooks"),
            templates_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("output"),
            export_templates_dir: None,
            github_token: None,
            github_api_url: "https://api.github.com".to_string(),
            github_raw_url: "https://raw.githubusercontent.com".to_string(),
            http_timeout_seconds: 30,
            execute_timeout_seconds: 300,
            jupyter_bin: None,
            default_css: String::new(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_non_empty(key).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_config_trims_trailing_slashes() {
        let config = ServerConfig {
            github_api_url: "http://localhost:9000/".to_string(),
            github_token: Some("secret".to_string()),
            http_timeout_seconds: 5,
            ..ServerConfig::default()
        };
        let remote = config.remote_config();
        assert_eq!(remote.api_base, "http://localhost:9000");
        assert_eq!(remote.token.as_deref(), Some("secret"));
        assert_eq!(remote.timeout, Duration::from_secs(5));
    }

    #[test]
    fn token_is_not_serialized() {
        let config = ServerConfig {
            github_token: Some("secret".to_string()),
            ..ServerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
