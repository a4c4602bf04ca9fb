//! Error types for mcp-http-tools.
//!
//! Errors fall into two families:
//!
//! - **Startup errors** ([`ConfigError`], [`RegistryError`], [`ServeError`],
//!   gathered into [`StartupError`]) abort the process before or while it
//!   binds its listener.
//! - **Tool errors** ([`ToolError`]) are values. They travel up through the
//!   dispatcher into the tool call result and never abort other requests.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// A port value could not be parsed.
    #[error("invalid port '{value}' from {origin}")]
    InvalidPort {
        /// Where the value came from (flag, environment variable, file).
        origin: String,
        /// The rejected value.
        value: String,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while building a tool registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A tool with the same name is already registered.
    #[error("tool already registered: {name}")]
    DuplicateTool {
        /// The conflicting tool name.
        name: String,
    },

    /// The declared input schema is not a usable JSON Schema object.
    #[error("invalid input schema for tool {name}: {message}")]
    InvalidSchema {
        /// The tool whose schema was rejected.
        name: String,
        /// Why the schema was rejected.
        message: String,
    },
}

/// Errors raised by the HTTP listener itself.
#[derive(Error, Debug)]
pub enum ServeError {
    /// The TCP listener could not be bound.
    #[error("failed to bind {addr}")]
    Bind {
        /// The address that failed to bind.
        addr: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server loop terminated with an IO error.
    #[error("server error")]
    Serve(#[source] std::io::Error),
}

/// Anything that stops a server binary before it starts serving.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A tool set failed to register.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The upstream HTTP client could not be built.
    #[error(transparent)]
    Upstream(#[from] crate::tools::upstream::UpstreamError),

    /// The listener failed.
    #[error(transparent)]
    Serve(#[from] ServeError),

    /// The async runtime could not be created.
    #[error("failed to create Tokio runtime")]
    Runtime(#[source] std::io::Error),
}

/// Classification of every failure the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Requested tool name is absent from the registry.
    ToolNotFound,
    /// Arguments failed to decode or violated declared constraints.
    InvalidArguments,
    /// The handler itself reported a failure.
    HandlerFailed,
    /// The HTTP body is not a valid JSON-RPC envelope.
    MalformedRequest,
    /// Unexpected failure in the transport.
    InternalFault,
}

impl ErrorKind {
    /// Stable snake_case label used in JSON-RPC error data.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolNotFound => "tool_not_found",
            Self::InvalidArguments => "invalid_arguments",
            Self::HandlerFailed => "handler_failed",
            Self::MalformedRequest => "malformed_request",
            Self::InternalFault => "internal_fault",
        }
    }
}

/// A tool-level failure, reported inside the tool call result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {name}")]
    ToolNotFound {
        /// The requested tool name.
        name: String,
    },

    /// Arguments could not be turned into the handler's input type.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// The offending field, when it can be identified.
        field: Option<String>,
        /// What was wrong with it.
        message: String,
    },

    /// The handler returned an error; its message is kept verbatim.
    #[error("{message}")]
    HandlerFailed {
        /// The handler's own error message.
        message: String,
    },
}

impl ToolError {
    /// Creates an [`ToolError::InvalidArguments`] for a known field.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::HandlerFailed { .. } => ErrorKind::HandlerFailed,
        }
    }
}
