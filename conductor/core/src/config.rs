//! Client Configuration
//!
//! Configuration is layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`$XDG_CONFIG_HOME/ragdesk/config.toml` or an explicit path)
//! 3. Environment variables (`RAGDESK_*`)
//! 4. Explicit [`ConfigOverrides`] from the embedding surface
//!
//! # Environment Variables
//!
//! - `RAGDESK_CONFIG`: path to the TOML file
//! - `RAGDESK_GATEWAY_URL`: API gateway base URL
//! - `RAGDESK_AUTH_URL`: auth provider base URL
//! - `RAGDESK_AUTH_API_KEY`: public API key sent to the auth provider
//! - `RAGDESK_AUTH_BYPASS`: `1`/`true` treats every visitor as signed in (dev only)
//! - `RAGDESK_PAGE_SIZE`: document status page size
//! - `RAGDESK_POLL_INTERVAL_MS`: document status poll interval
//! - `RAGDESK_MAX_MESSAGE_BYTES`: maximum chat input size
//! - `RAGDESK_REQUEST_TIMEOUT_MS`: HTTP timeout (unset = client default)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Errors while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// File is not valid TOML for [`ClientConfig`]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where the file layer came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// No file was found; defaults + environment only
    Defaults,
    /// Default location under the user config dir
    DefaultPath(PathBuf),
    /// Path given by `RAGDESK_CONFIG` or the caller
    ExplicitPath(PathBuf),
}

/// Client configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API gateway base URL
    pub gateway_url: String,
    /// Auth provider base URL
    pub auth_url: String,
    /// Public API key for the auth provider
    pub auth_api_key: String,
    /// Treat every visitor as implicitly authenticated
    pub auth_bypass: bool,
    /// Document status page size
    pub page_size: usize,
    /// Document status poll interval
    pub poll_interval_ms: u64,
    /// Maximum chat input size in bytes
    pub max_message_bytes: usize,
    /// HTTP request timeout (None = client default)
    pub request_timeout_ms: Option<u64>,
    /// Retry policy for idempotent reads
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8000".to_string(),
            auth_url: "http://localhost:54321".to_string(),
            auth_api_key: String::new(),
            auth_bypass: false,
            page_size: 20,
            poll_interval_ms: 5_000,
            max_message_bytes: 32 * 1024,
            request_timeout_ms: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the process environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from an environment lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RAGDESK_GATEWAY_URL") {
            self.gateway_url = v;
        }
        if let Some(v) = lookup("RAGDESK_AUTH_URL") {
            self.auth_url = v;
        }
        if let Some(v) = lookup("RAGDESK_AUTH_API_KEY") {
            self.auth_api_key = v;
        }
        if let Some(v) = lookup("RAGDESK_AUTH_BYPASS") {
            self.auth_bypass = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("RAGDESK_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.page_size = v;
        }
        if let Some(v) = lookup("RAGDESK_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = v;
        }
        if let Some(v) = lookup("RAGDESK_MAX_MESSAGE_BYTES").and_then(|v| v.parse().ok()) {
            self.max_message_bytes = v;
        }
        if let Some(v) = lookup("RAGDESK_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = Some(v);
        }
    }

    /// Apply explicit overrides
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref v) = overrides.gateway_url {
            self.gateway_url.clone_from(v);
        }
        if let Some(ref v) = overrides.auth_url {
            self.auth_url.clone_from(v);
        }
        if let Some(v) = overrides.auth_bypass {
            self.auth_bypass = v;
        }
        if let Some(v) = overrides.page_size {
            self.page_size = v;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway_url.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway_url must not be empty".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_message_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Poll interval as a duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Request timeout as a duration
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Values a surface can force regardless of file or environment
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Gateway base URL
    pub gateway_url: Option<String>,
    /// Auth provider base URL
    pub auth_url: Option<String>,
    /// Auth bypass flag
    pub auth_bypass: Option<bool>,
    /// Page size
    pub page_size: Option<usize>,
}

/// Default config file location
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ragdesk").join("config.toml"))
}

/// Parse a config file without applying environment or overrides
pub fn load_config_from_path(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load configuration with full layering
pub fn load_config(
    overrides: &ConfigOverrides,
) -> Result<(ClientConfig, ConfigSource), ConfigError> {
    let explicit = std::env::var("RAGDESK_CONFIG").ok().map(PathBuf::from);
    let (mut config, source) = match explicit {
        Some(path) => (
            load_config_from_path(&path)?,
            ConfigSource::ExplicitPath(path),
        ),
        None => match default_config_path().filter(|p| p.exists()) {
            Some(path) => (load_config_from_path(&path)?, ConfigSource::DefaultPath(path)),
            None => (ClientConfig::default(), ConfigSource::Defaults),
        },
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.apply_overrides(overrides);
    config.validate()?;

    tracing::debug!(source = ?source, gateway = %config.gateway_url, "Configuration loaded");
    Ok((config, source))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.auth_bypass);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = ClientConfig {
            poll_interval_ms: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_layer() {
        let env: HashMap<&str, &str> = [
            ("RAGDESK_GATEWAY_URL", "https://api.example.com"),
            ("RAGDESK_AUTH_BYPASS", "TRUE"),
            ("RAGDESK_PAGE_SIZE", "50"),
            ("RAGDESK_POLL_INTERVAL_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_env(|key| env.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.gateway_url, "https://api.example.com");
        assert!(config.auth_bypass);
        assert_eq!(config.page_size, 50);
        // Unparsable values keep the previous layer
        assert_eq!(config.poll_interval_ms, 5_000);
    }

    #[test]
    fn test_file_layer_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gateway_url = \"https://kb.internal\"\npage_size = 5\n\n[retry]\nmax_retries = 4"
        )
        .unwrap();

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.gateway_url, "https://kb.internal");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.retry.initial_backoff_ms, 200);
        assert_eq!(config.auth_url, ClientConfig::default().auth_url);
    }

    #[test]
    fn test_file_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size = \"many\"").unwrap();
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = ClientConfig::default();
        config.apply_overrides(&ConfigOverrides {
            gateway_url: Some("http://override".into()),
            auth_bypass: Some(true),
            ..Default::default()
        });
        assert_eq!(config.gateway_url, "http://override");
        assert!(config.auth_bypass);
    }

    #[test]
    fn test_validate_rejects_zero_page() {
        let config = ClientConfig {
            page_size: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
