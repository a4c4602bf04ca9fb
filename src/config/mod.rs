//! Configuration file loading, validation and port resolution.
//!
//! # Configuration File Locations
//!
//! The configuration file is optional. It is looked up in this order:
//!
//! 1. Path given as the positional `CONFIG_FILE` argument (must exist)
//! 2. Default location, per server (used only if present):
//!    - **Linux/macOS:** `~/.mcp-http-tools/<server>.json`
//!    - **Windows:** `%USERPROFILE%\.mcp-http-tools\<server>.json`
//!
//! # Port Resolution
//!
//! `--port` flag, else the server's port environment variable (for example
//! `MOON_SERVER_PORT`), else `server.port` from the file, else the server's
//! fixed default.
//!
//! # Example Configuration
//!
//! See `config/example-config.json` for a complete example.

mod settings;

pub use settings::{
    Config, LoggingConfig, ResponseMode, ServerConfig, UpstreamConfig, MAX_UPSTREAM_TIMEOUT_SECS,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.mcp-http-tools/`
/// - **Windows:** `%USERPROFILE%\.mcp-http-tools\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".mcp-http-tools"))
}

/// Returns the default configuration file path for one server.
#[must_use]
pub fn default_config_path(server_name: &str) -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(format!("{server_name}.json")))
}

/// Loads and parses the configuration file.
///
/// An explicit `path` must exist. Without one, the default location is tried
/// and built-in defaults are used if nothing is there.
///
/// # Errors
///
/// Returns an error if:
/// - The explicit configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - A field is out of range
pub fn load_config(path: Option<&Path>, server_name: &str) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            })
        }
        Some(p) => p.to_path_buf(),
        None => match default_config_path(server_name) {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!(server = server_name, "No configuration file, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    config.validate()?;

    Ok(config)
}

/// Parses a port number, rejecting zero.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] naming `origin` if `value` is not a
/// port in 1..=65535.
pub fn parse_port(origin: &str, value: &str) -> Result<u16, ConfigError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            origin: origin.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Resolves the listening port, reading `env_var` from the process environment.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] if the environment variable is set to
/// something that is not a port.
pub fn resolve_port(
    cli: Option<u16>,
    env_var: &str,
    file: Option<u16>,
    default: u16,
) -> Result<u16, ConfigError> {
    resolve_port_from(cli, env_var, std::env::var(env_var).ok(), file, default)
}

/// Resolves the listening port from already gathered sources.
///
/// An empty environment value counts as unset.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] if `env_value` is not a port.
pub fn resolve_port_from(
    cli: Option<u16>,
    env_var: &str,
    env_value: Option<String>,
    file: Option<u16>,
    default: u16,
) -> Result<u16, ConfigError> {
    if let Some(port) = cli {
        return Ok(port);
    }
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return parse_port(env_var, &value);
    }
    Ok(file.unwrap_or(default))
}
