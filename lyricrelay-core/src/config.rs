use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Base URL of the provider's desktop web API.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://apic-desktop.musixmatch.com/ws/1.1";

/// Application id the desktop web API expects on every call.
pub const DEFAULT_APP_ID: &str = "web-desktop-app-v1.0";

/// Main configuration structure.
///
/// Every section is optional; the defaults reproduce the relay's stock
/// behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// How long a freshly acquired token is trusted
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Whole-request timeout for upstream calls; 0 disables it
    #[serde(default)]
    pub request_timeout_secs: u64,
    #[serde(default = "default_search_page_size")]
    pub search_page_size: u32,
}

fn default_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

const fn default_token_ttl_secs() -> u64 {
    600
}

const fn default_search_page_size() -> u32 {
    5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: default_app_id(),
            token_ttl_secs: default_token_ttl_secs(),
            request_timeout_secs: 0,
            search_page_size: default_search_page_size(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Also write logs to ~/.config/lyricrelay/lyricrelay.log
    #[serde(default)]
    pub file: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            file: false,
        }
    }
}

impl RelayConfig {
    /// Get the default config file path (~/.config/lyricrelay/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from `path`.
    ///
    /// A missing file yields the defaults; nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// contains invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            CoreError::ConfigParse { source, .. } => CoreError::ConfigParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Write the commented config template to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigExists`] if a file is already there, or an
    /// IO error if it cannot be written.
    pub fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(CoreError::ConfigExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, CONFIG_TEMPLATE)?;
        info!("Wrote config template to {}", path.display());
        Ok(())
    }

    /// Parse and validate config text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParse`] for malformed TOML and
    /// [`CoreError::ConfigInvalid`] for out-of-range values.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| CoreError::ConfigParse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be between 1 and 65535"));
        }
        if self.server.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        let base_url = self.provider.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("provider.base_url must be an http(s) URL"));
        }
        if self.provider.app_id.trim().is_empty() {
            return Err(invalid("provider.app_id must not be empty"));
        }
        if self.provider.token_ttl_secs == 0 {
            return Err(invalid("provider.token_ttl_secs must be greater than 0"));
        }
        if self.provider.search_page_size == 0 {
            return Err(invalid("provider.search_page_size must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::ConfigInvalid {
        message: message.to_string(),
    }
}

const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# lyricrelay configuration
# ~/.config/lyricrelay/config.toml
# Every value below is the built-in default; uncomment to change it.

[server]
# host = "0.0.0.0"
# port = 3000

[provider]
# base_url = ""#,
    DEFAULT_PROVIDER_BASE_URL,
    r#""
# app_id = ""#,
    DEFAULT_APP_ID,
    r#""
# Seconds a freshly acquired token is reused before refreshing
# token_ttl_secs = 600
# Upstream request timeout in seconds (0 = wait indefinitely)
# request_timeout_secs = 0
# search_page_size = 5

[logging]
# Default filter; RUST_LOG takes precedence
# filter = "info"
# Also write logs to ~/.config/lyricrelay/lyricrelay.log
# file = false
"#
);
