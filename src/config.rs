use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classifier::{SizeThresholds, DEFAULT_LARGE_MIN_BYTES, DEFAULT_MEDIUM_MIN_BYTES};
use crate::error::{GmailError, Result};
use crate::session::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
use crate::limits::{RequestLimits, DEFAULT_MAX_RESULTS, MAX_MAX_RESULTS, MIN_MAX_RESULTS};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default)]
    pub secure_cookies: bool,
    /// Idle seconds before a session is forgotten
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            credentials_path: default_credentials_path(),
            redirect_uri: default_redirect_uri(),
            session_cookie: default_session_cookie(),
            secure_cookies: false,
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
    #[serde(default = "default_min_max_results")]
    pub min_max_results: u32,
    #[serde(default = "default_max_max_results")]
    pub max_max_results: u32,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            min_max_results: default_min_max_results(),
            max_max_results: default_max_max_results(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FetchConfig {
    pub fn request_limits(&self) -> Result<RequestLimits> {
        RequestLimits::new(
            self.default_max_results,
            self.min_max_results,
            self.max_max_results,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_medium_min_bytes")]
    pub medium_min_bytes: u64,
    #[serde(default = "default_large_min_bytes")]
    pub large_min_bytes: u64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            medium_min_bytes: default_medium_min_bytes(),
            large_min_bytes: default_large_min_bytes(),
        }
    }
}

impl ClassificationConfig {
    pub fn thresholds(&self) -> Result<SizeThresholds> {
        SizeThresholds::new(self.medium_min_bytes, self.large_min_bytes)
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_redirect_uri() -> String {
    "http://127.0.0.1:5000/oauth2callback".to_string()
}

fn default_session_cookie() -> String {
    "gmail_sizer_session".to_string()
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL.as_secs()
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_min_max_results() -> u32 {
    MIN_MAX_RESULTS
}

fn default_max_max_results() -> u32 {
    MAX_MAX_RESULTS
}

fn default_max_concurrent() -> usize {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_medium_min_bytes() -> u64 {
    DEFAULT_MEDIUM_MIN_BYTES
}

fn default_large_min_bytes() -> u64 {
    DEFAULT_LARGE_MIN_BYTES
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| GmailError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(GmailError::ConfigError(format!(
                "server.bind_addr '{}' is not a socket address",
                self.server.bind_addr
            )));
        }

        if url::Url::parse(&self.server.redirect_uri).is_err() {
            return Err(GmailError::ConfigError(format!(
                "server.redirect_uri '{}' is not a valid URL",
                self.server.redirect_uri
            )));
        }

        // Cookie names are HTTP tokens: no separators, spaces or controls
        let cookie = &self.server.session_cookie;
        if cookie.is_empty()
            || !cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
        {
            return Err(GmailError::ConfigError(format!(
                "server.session_cookie '{}' must be a non-empty token of [A-Za-z0-9-_.]",
                cookie
            )));
        }

        if self.server.session_ttl_secs == 0 {
            return Err(GmailError::ConfigError(
                "server.session_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.server.max_sessions == 0 {
            return Err(GmailError::ConfigError(
                "server.max_sessions must be at least 1".to_string(),
            ));
        }

        self.fetch
            .request_limits()
            .map_err(|e| GmailError::ConfigError(format!("fetch: {}", e)))?;

        if self.fetch.max_concurrent_requests == 0 {
            return Err(GmailError::ConfigError(
                "fetch.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_concurrent_requests > 50 {
            return Err(GmailError::ConfigError(
                "fetch.max_concurrent_requests cannot exceed 50".to_string(),
            ));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(GmailError::ConfigError(
                "fetch.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        self.classification
            .thresholds()
            .map_err(|e| GmailError::ConfigError(format!("classification: {}", e)))?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
