//! Model Context Protocol (MCP) over streamable HTTP.
//!
//! Every server binary shares this module; only the registered tool set and
//! the server identity differ between them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           MCP Server                             │
//! │                                                                  │
//! │  ┌────────┐   ┌─────────┐   ┌───────────┐   ┌────────────┐       │
//! │  │  CORS  │──▶│ Capture │──▶│ Transport │──▶│ Dispatcher │       │
//! │  │ (opt.) │   │ (diag.) │   │ (JSON/SSE)│   │  (methods) │       │
//! │  └────────┘   └─────────┘   └───────────┘   └─────┬──────┘       │
//! │                                                   │              │
//! │                                                   ▼              │
//! │                                           ┌──────────────┐       │
//! │                                           │   Registry   │       │
//! │                                           │ (typed tools)│       │
//! │                                           └──────────────┘       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2025-06-18 and accepts
//! 2025-03-26 and 2024-11-05.

pub mod capture;
pub mod context;
pub mod cors;
pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use context::CallContext;
pub use dispatcher::{Dispatcher, ServerInfo};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use registry::{ToolDescriptor, ToolHandler, ToolRegistry};
pub use server::McpHttpServer;
pub use transport::{build_router, AppState};
