//! mcp-http-tools: Model Context Protocol tool servers over streamable HTTP.
//!
//! One shared core (registry, dispatcher, HTTP transport, cross-origin
//! middleware) hosts three independent tool sets, each built as its own
//! binary:
//!
//! - **moon-server**: lunar phase and monthly phase calendar
//! - **quotes-server**: random and searched quotes, with a local fallback table
//! - **weather-server**: current conditions and daily forecasts from Open-Meteo
//!
//! # Modules
//!
//! - [`cli`]: Argument parsing, logging setup and the process entry point
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol, dispatch and HTTP transport
//! - [`tools`]: The reference tool sets

pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;
