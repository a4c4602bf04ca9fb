//! The reference tool sets, one per server binary.
//!
//! | Tool set | Tools |
//! |----------|-------|
//! | [`ToolSet::Moon`] | `get_moon_phase`, `get_moon_calendar` |
//! | [`ToolSet::Quotes`] | `get_random_quote`, `search_quotes`, `list_categories` |
//! | [`ToolSet::Weather`] | `get_current_weather`, `get_forecast` |

pub mod moon;
pub mod quotes;
pub mod upstream;
pub mod weather;

use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::error::StartupError;
use crate::mcp::registry::ToolRegistry;
use upstream::UpstreamClient;

/// Selects which tools a server process hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSet {
    /// Lunar phase arithmetic (no upstream).
    Moon,
    /// ZenQuotes with a local fallback table.
    Quotes,
    /// Open-Meteo current conditions and forecasts.
    Weather,
}

impl ToolSet {
    /// Server identity reported by `initialize` and `/health`.
    #[must_use]
    pub const fn server_name(self) -> &'static str {
        match self {
            Self::Moon => "moon-phase-server",
            Self::Quotes => "quotes-server",
            Self::Weather => "weather-server",
        }
    }

    /// Environment variable overriding the listening port.
    #[must_use]
    pub const fn port_env_var(self) -> &'static str {
        match self {
            Self::Moon => "MOON_SERVER_PORT",
            Self::Quotes => "QUOTES_SERVER_PORT",
            Self::Weather => "WEATHER_SERVER_PORT",
        }
    }

    /// Port used when nothing else is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Moon => 8081,
            Self::Quotes => 8082,
            Self::Weather => 8083,
        }
    }

    /// Public API root, if the tool set calls one.
    #[must_use]
    pub const fn default_upstream_url(self) -> Option<&'static str> {
        match self {
            Self::Moon => None,
            Self::Quotes => Some("https://zenquotes.io"),
            Self::Weather => Some("https://api.open-meteo.com"),
        }
    }

    /// Per-request upstream timeout when the configuration names none.
    #[must_use]
    pub const fn default_timeout_secs(self) -> u64 {
        match self {
            Self::Moon | Self::Weather => 10,
            Self::Quotes => 5,
        }
    }

    /// Builds the frozen registry for this tool set.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream client cannot be built or a tool
    /// fails to register.
    pub fn build_registry(self, upstream: &UpstreamConfig) -> Result<ToolRegistry, StartupError> {
        let mut registry = ToolRegistry::new();
        match self {
            Self::Moon => moon::register(&mut registry)?,
            Self::Quotes => quotes::register(&mut registry, self.upstream_client(upstream)?)?,
            Self::Weather => weather::register(&mut registry, self.upstream_client(upstream)?)?,
        }
        tracing::debug!(
            server = self.server_name(),
            tools = registry.len(),
            "Tool registry built"
        );
        Ok(registry)
    }

    fn upstream_client(self, config: &UpstreamConfig) -> Result<UpstreamClient, StartupError> {
        let base_url = config
            .base_url
            .as_deref()
            .or_else(|| self.default_upstream_url())
            .unwrap_or_default();
        let timeout = Duration::from_secs(
            config
                .timeout_secs
                .unwrap_or_else(|| self.default_timeout_secs()),
        );
        Ok(UpstreamClient::new(base_url, timeout)?)
    }
}
