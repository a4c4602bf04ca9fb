//! Shared HTTP client for upstream JSON APIs.
//!
//! Every request is bounded by the client's timeout and abandoned as soon as
//! the calling tool's context is cancelled.

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::mcp::context::CallContext;

/// Failures talking to an upstream API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    Client {
        /// The underlying error text.
        message: String,
    },

    /// The client went away before the call finished.
    #[error("request cancelled")]
    Cancelled,

    /// The upstream did not answer in time.
    #[error("request timed out after {secs}s")]
    Timeout {
        /// The configured timeout.
        secs: u64,
    },

    /// Connection or protocol failure.
    #[error("request failed: {message}")]
    Request {
        /// The underlying error text.
        message: String,
    },

    /// The upstream answered with a non-success status.
    #[error("API returned status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The body was not the expected JSON.
    #[error("failed to parse API response: {message}")]
    Decode {
        /// The underlying error text.
        message: String,
    },
}

/// A JSON-over-HTTP client rooted at one base URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl UpstreamClient {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Client`] if the TLS backend cannot be set up.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// The API root requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches `path` with `query` and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] for cancellation, timeout, transport
    /// failure, a non-success status or an undecodable body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        if ctx.is_cancelled() {
            return Err(UpstreamError::Cancelled);
        }

        let url = format!("{}{path}", self.base_url);
        tracing::debug!(url = %url, "Fetching from upstream");

        let request = self.client.get(&url).query(query).send();
        let response = tokio::select! {
            biased;
            () = ctx.cancelled() => return Err(UpstreamError::Cancelled),
            response = request => response.map_err(|e| self.classify(&e))?,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Upstream returned non-success status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(UpstreamError::Cancelled),
            body = response.json::<T>() => body.map_err(|e| {
                if e.is_timeout() {
                    self.classify(&e)
                } else {
                    UpstreamError::Decode { message: e.to_string() }
                }
            }),
        }
    }

    fn classify(&self, error: &reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            UpstreamError::Request {
                message: error.to_string(),
            }
        }
    }
}
