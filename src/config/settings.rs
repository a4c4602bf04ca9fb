//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::net::{IpAddr, Ipv4Addr};

use serde::Deserialize;

use crate::error::ConfigError;

/// Upper bound for upstream request timeouts, in seconds.
pub const MAX_UPSTREAM_TIMEOUT_SECS: u64 = 60;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream API settings (quotes and weather servers).
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == Some(0) {
            return Err(ConfigError::ValidationError {
                message: "server.port must be between 1 and 65535".to_string(),
            });
        }

        if let Some(timeout) = self.upstream.timeout_secs {
            if !(1..=MAX_UPSTREAM_TIMEOUT_SECS).contains(&timeout) {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "upstream.timeout_secs must be between 1 and {MAX_UPSTREAM_TIMEOUT_SECS}, got {timeout}"
                    ),
                });
            }
        }

        if let Some(ref url) = self.upstream.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError {
                    message: format!(
                        "Invalid upstream.base_url '{url}'. Must start with http:// or https://"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// How `POST /mcp` replies are framed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Event stream when the client accepts one, JSON otherwise.
    #[default]
    Auto,
    /// Always a single JSON document.
    Json,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listening port. Overridden by `--port` and the server's port variable.
    #[serde(default)]
    pub port: Option<u16>,

    /// Listening address.
    /// Default: 0.0.0.0
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Enable cross-origin headers and preflight handling.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Reply framing policy.
    #[serde(default)]
    pub response_mode: ResponseMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            host: default_host(),
            cors: default_true(),
            response_mode: ResponseMode::default(),
        }
    }
}

const fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_true() -> bool {
    true
}

/// Upstream API configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// API root replacing the public default (useful for mirrors and tests).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
