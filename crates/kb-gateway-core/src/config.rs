//! Gateway configuration.
//!
//! | Key / Env | Default | Description |
//! |-----------|---------|-------------|
//! | upstream_base_url / KB_GATEWAY_UPSTREAM_BASE_URL | https://api.ragie.ai | Base URL of the document-retrieval API. |
//! | api_token / KB_GATEWAY_API_TOKEN | (required) | Bearer token attached to every upstream call. |
//! | bind_addr / KB_GATEWAY_BIND_ADDR | 0.0.0.0:8000 | Listen address of the HTTP server. |
//! | request_timeout_secs / KB_GATEWAY_REQUEST_TIMEOUT_SECS | unset | Transport timeout for upstream calls. |
//! | max_upload_bytes / KB_GATEWAY_MAX_UPLOAD_BYTES | 104857600 | Largest accepted `/ingest` request body. |
//!
//! Precedence: env > file (`KB_GATEWAY_CONFIG`, default `config/kb-gateway`) > defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.ragie.ai";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const DEFAULT_CONFIG_PATH: &str = "config/kb-gateway";
const ENV_PREFIX: &str = "KB_GATEWAY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration load failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("No upstream API token configured (set KB_GATEWAY_API_TOKEN)")]
    MissingToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub upstream_base_url: String,
    pub api_token: String,
    pub bind_addr: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl GatewayConfig {
    pub fn new(upstream_base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            upstream_base_url: upstream_base_url.into(),
            api_token: api_token.into(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout_secs: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Load from the file named by `KB_GATEWAY_CONFIG` (if any) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("KB_GATEWAY_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(path)
    }

    /// Load with `path` as the optional config file (extension may be omitted).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let built = config::Config::builder()
            .set_default("upstream_base_url", DEFAULT_UPSTREAM_BASE_URL)?
            .set_default("api_token", "")?
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: GatewayConfig = built.try_deserialize()?;
        cfg.validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.api_token = self.api_token.trim().to_string();
        if self.api_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        self.upstream_base_url = self.upstream_base_url.trim().to_string();
        Ok(self)
    }

    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.upstream_base_url.trim_end_matches('/')
    }
}
