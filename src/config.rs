//! Configuration loading for the extension.
//!
//! Every setting has a default matching the reference deployment, so the
//! extension runs with no configuration file at all. A TOML file can be
//! shipped in the layer and passed with `--config <path>`; CLI flags and
//! environment variables (see the binary) override individual values.
//!
//! ```toml
//! [server]
//! port = 2772
//! shutdown_grace_ms = 100
//!
//! [cache]
//! ttl_secs = 30
//! cleanup_interval_secs = 60
//!
//! [parameter]
//! name = "extension-parameter"
//! with_decryption = false
//!
//! [extension]
//! name = "main"
//! ```

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::{ExtensionError, Result};

/// Default loopback port of the local endpoint.
pub const DEFAULT_PORT: u16 = 2772;

/// Default remote parameter name.
pub const DEFAULT_PARAMETER_NAME: &str = "extension-parameter";

/// Default name sent in `Lambda-Extension-Name` on registration.
pub const DEFAULT_EXTENSION_NAME: &str = "main";

/// Extension configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub parameter: ParameterConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

/// Local endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Loopback port to listen on (default: 2772).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period for in-flight requests on shutdown (default: 100 ms).
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ServerConfig {
    /// Config listening on the given port with default grace period.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Loopback socket address for the local endpoint.
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_shutdown_grace_ms() -> u64 {
    100
}

/// Cache settings as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Time-to-live of a fetched value in seconds (default: 30).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval of the expired-entry sweep in seconds (default: 60).
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl From<CacheSettings> for CacheConfig {
    fn from(settings: CacheSettings) -> Self {
        CacheConfig::new()
            .ttl(Duration::from_secs(settings.ttl_secs))
            .cleanup_interval(Duration::from_secs(settings.cleanup_interval_secs))
    }
}

fn default_ttl_secs() -> u64 {
    30
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

/// Remote parameter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterConfig {
    /// Name of the parameter in the remote store (default: `extension-parameter`).
    #[serde(default = "default_parameter_name")]
    pub name: String,
    /// Ask the store to decrypt `SecureString` values (default: false).
    #[serde(default)]
    pub with_decryption: bool,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            name: default_parameter_name(),
            with_decryption: false,
        }
    }
}

fn default_parameter_name() -> String {
    DEFAULT_PARAMETER_NAME.to_string()
}

/// Lifecycle registration configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    /// Name registered with the host (default: `main`).
    #[serde(default = "default_extension_name")]
    pub name: String,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            name: default_extension_name(),
        }
    }
}

fn default_extension_name() -> String {
    DEFAULT_EXTENSION_NAME.to_string()
}

impl Config {
    /// Load configuration.
    ///
    /// With no explicit path the built-in defaults are returned. An explicit
    /// path must exist and parse.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let Some(path) = explicit_path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(ExtensionError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ExtensionError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ExtensionError::Configuration(msg) => {
                ExtensionError::Configuration(format!("{msg} (in {path:?})"))
            }
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| {
            ExtensionError::Configuration(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the extension cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.parameter.name.trim().is_empty() {
            return Err(ExtensionError::Configuration(
                "parameter name must not be empty".to_string(),
            ));
        }
        if self.extension.name.trim().is_empty() {
            return Err(ExtensionError::Configuration(
                "extension name must not be empty".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ExtensionError::Configuration(
                "cache ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(ExtensionError::Configuration(
                "cache cleanup_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.cache.clone().into()
    }
}
