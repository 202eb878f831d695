//! # Configuration
//!
//! Application settings loaded from TOML. Every section and field has a
//! default, so an empty file is a valid configuration.
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:8080"
//! max_body_size = 2097152
//!
//! [cache]
//! default_ttl_secs = 600
//! groups = ["user:", "page:"]
//! prefix_match = "key_starts_with_prefix"
//!
//! [log]
//! level = "debug"
//! json = true
//! ```

use crate::cache_group::PrefixMatch;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Cache group layout
    pub cache: CacheConfig,
    /// Logging settings
    pub log: LogConfig,
}

/// HTTP Server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_timeout_secs: u64,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout_secs: 30,
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Shutdown drain timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Cache group layout: one memory cache per prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied by `set_default`; `0` never expires
    pub default_ttl_secs: u64,
    /// Key prefixes, one child cache each
    pub groups: Vec<String>,
    /// How keys are matched against `groups`
    pub prefix_match: PrefixMatch,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            groups: Vec::new(),
            prefix_match: PrefixMatch::default(),
        }
    }
}

impl CacheConfig {
    /// Upper bound for `default_ttl_secs`: one year
    pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

    /// TTL applied when the caller does not pass one
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter level when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlParse` on malformed TOML and `Error::Config` if a
    /// value is out of range.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, otherwise as
    /// [`AppConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check semantic constraints
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_body_size == 0 {
            return Err(Error::Config("server.max_body_size must be positive".into()));
        }
        if self.cache.groups.iter().any(String::is_empty) {
            return Err(Error::Config("cache.groups must not contain empty prefixes".into()));
        }
        if self.cache.default_ttl_secs > CacheConfig::MAX_TTL_SECS {
            return Err(Error::Config(format!(
                "cache.default_ttl_secs must not exceed {} (use 0 to never expire)",
                CacheConfig::MAX_TTL_SECS
            )));
        }
        if self.log.level.trim().is_empty() {
            return Err(Error::Config("log.level must not be empty".into()));
        }
        Ok(())
    }
}
