//! Protocol method routing and tool-call marshaling.
//!
//! The dispatcher owns the frozen [`ToolRegistry`] and answers exactly one
//! decoded request at a time per call. It holds no cross-call state, so one
//! instance is shared (behind an `Arc`) by every concurrent HTTP request.
//!
//! # Methods
//!
//! | Method       | Result                                              |
//! |--------------|-----------------------------------------------------|
//! | `initialize` | negotiated version, empty capabilities, server info |
//! | `tools/list` | registry descriptors in registration order          |
//! | `tools/call` | tool outcome (see [`ToolCallResult::into_reply`])   |
//! | `ping`       | `{}`                                                |
//!
//! No ordering is enforced between methods: every request stands alone.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::mcp::context::CallContext;
use crate::mcp::protocol::{
    negotiate_version, JsonRpcError, JsonRpcErrorData, JsonRpcReply, JsonRpcRequest,
    JsonRpcResponse, Method, RequestId, ErrorCode, MCP_PROTOCOL_VERSION,
};
use crate::mcp::registry::{ToolDescriptor, ToolRegistry};

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server identity reported by `initialize` and `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates an identity with the crate version.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    #[serde(default)]
    pub protocol_version: Option<String>,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    /// Client information.
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// The protocol conversation established by one `initialize`.
///
/// Nothing is stored: the session exists only for the duration of the
/// request that created it, and clients carry its identifier themselves.
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier minted by the transport, if any.
    pub id: Option<String>,
    /// The version both sides agreed on.
    pub protocol_version: &'static str,
    /// Who the client says it is.
    pub client: Option<ClientInfo>,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// The `result` member of a `tools/call` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Machine-readable copy of the tool output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Wraps a successful tool output.
    #[must_use]
    pub fn structured(output: Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: output.to_string(),
            }],
            structured_content: Some(output),
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }
}

/// A decoded inbound request, consumed once by [`Dispatcher::dispatch`].
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Correlation id echoed in the reply.
    pub id: RequestId,
    /// The routed method.
    pub method: Method,
    /// `params.name` for `tools/call`.
    pub tool_name: Option<String>,
    /// `params.arguments` for `tools/call`, untouched.
    pub raw_arguments: Value,
    /// `params._meta.progressToken`, if the client asked for progress.
    pub progress_token: Option<Value>,
    /// The full `params` member.
    pub params: Option<Value>,
}

impl From<JsonRpcRequest> for ToolCallRequest {
    fn from(request: JsonRpcRequest) -> Self {
        let method = Method::from(request.method.as_str());
        let params = request.params;

        let (tool_name, raw_arguments, progress_token) = match (&method, &params) {
            (Method::ToolsCall, Some(Value::Object(map))) => (
                map.get("name").and_then(Value::as_str).map(str::to_string),
                map.get("arguments").cloned().unwrap_or(Value::Null),
                map.get("_meta")
                    .and_then(|meta| meta.get("progressToken"))
                    .filter(|token| token.is_string() || token.is_number())
                    .cloned(),
            ),
            _ => (None, Value::Null, None),
        };

        Self {
            id: request.id,
            method,
            tool_name,
            raw_arguments,
            progress_token,
            params,
        }
    }
}

/// The outcome of one `tools/call`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    /// Echoes the request id.
    pub id: RequestId,
    /// Typed output encoded as JSON, or the classified failure.
    pub outcome: Result<Value, ToolError>,
}

impl ToolCallResult {
    /// Encodes the outcome as a JSON-RPC reply.
    ///
    /// Lookup and argument failures are protocol errors (`-32602`) with the
    /// error kind in `data`. Handler failures are ordinary results flagged
    /// `isError`, so the client sees the handler's message verbatim.
    #[must_use]
    pub fn into_reply(self) -> JsonRpcReply {
        let error = match self.outcome {
            Ok(output) => return success(self.id, &CallToolResult::structured(output)),
            Err(error) => error,
        };

        match &error {
            ToolError::HandlerFailed { message } => {
                success(self.id, &CallToolResult::error(message.clone()))
            }
            ToolError::ToolNotFound { .. } => {
                let data = json!({ "kind": error.kind().as_str() });
                invalid_params_with(self.id, &error, data)
            }
            ToolError::InvalidArguments { field, .. } => {
                let mut data = json!({ "kind": error.kind().as_str() });
                if let Some(field) = field {
                    data["field"] = Value::String(field.clone());
                }
                invalid_params_with(self.id, &error, data)
            }
        }
    }
}

fn success(id: RequestId, result: &impl Serialize) -> JsonRpcReply {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value).into(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(Some(id), "Internal error: failed to serialise result")
                .into()
        }
    }
}

fn invalid_params_with(id: RequestId, error: &ToolError, data: Value) -> JsonRpcReply {
    JsonRpcError::new(
        Some(id),
        JsonRpcErrorData::with_message(ErrorCode::InvalidParams, error.to_string()).with_data(data),
    )
    .into()
}

/// Routes requests to the registry.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ToolRegistry,
    server_info: ServerInfo,
}

impl Dispatcher {
    /// Creates a dispatcher over a fully built registry.
    #[must_use]
    pub const fn new(registry: ToolRegistry, server_info: ServerInfo) -> Self {
        Self {
            registry,
            server_info,
        }
    }

    /// The registry this dispatcher serves.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The server identity.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Answers one request.
    pub async fn dispatch(&self, request: ToolCallRequest, ctx: &CallContext) -> JsonRpcReply {
        tracing::debug!(id = %request.id, method = %request.method, "Dispatching request");

        match request.method {
            Method::Initialize => {
                let (session, result) = self.initialize(request.params.as_ref(), ctx);
                tracing::info!(
                    session_id = session.id.as_deref().unwrap_or("-"),
                    protocol_version = session.protocol_version,
                    client = session.client.as_ref().map_or("unknown", |c| c.name.as_str()),
                    "Session initialised"
                );
                JsonRpcResponse::success(request.id, result).into()
            }
            Method::ToolsList => {
                JsonRpcResponse::success(request.id, json!({ "tools": self.list_tools() })).into()
            }
            Method::ToolsCall => {
                let Some(name) = request.tool_name else {
                    return JsonRpcError::invalid_params(
                        request.id,
                        "Invalid tool call params: missing tool name",
                    )
                    .into();
                };
                let outcome = self.call_tool(&name, request.raw_arguments, ctx).await;
                ToolCallResult {
                    id: request.id,
                    outcome,
                }
                .into_reply()
            }
            Method::Ping => JsonRpcResponse::success(request.id, json!({})).into(),
            Method::Other(method) => JsonRpcError::method_not_found(request.id, &method).into(),
        }
    }

    /// Negotiates a session. Never fails: malformed params fall back to defaults.
    #[must_use]
    pub fn initialize(&self, params: Option<&Value>, ctx: &CallContext) -> (Session, Value) {
        let params = params
            .map(|p| serde_json::from_value::<InitializeParams>(p.clone()))
            .transpose()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring malformed initialize params");
                None
            })
            .unwrap_or_default();

        let protocol_version = params
            .protocol_version
            .as_deref()
            .map_or(MCP_PROTOCOL_VERSION, negotiate_version);

        let result = json!({
            "protocolVersion": protocol_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": self.server_info,
        });

        let session = Session {
            id: ctx.session_id().map(str::to_string),
            protocol_version,
            client: params.client_info,
        };
        (session, result)
    }

    /// Returns the registry's descriptors unchanged.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    /// Resolves, prepares and invokes one tool.
    ///
    /// # Errors
    ///
    /// Returns the [`ToolError`] describing why the call did not succeed.
    pub async fn call_tool(
        &self,
        name: &str,
        raw_arguments: Value,
        ctx: &CallContext,
    ) -> Result<Value, ToolError> {
        let tool = self.registry.resolve(name).inspect_err(|_| {
            tracing::warn!(tool = name, "Unknown tool requested");
        })?;

        let arguments = tool.prepare_arguments(raw_arguments).inspect_err(|e| {
            tracing::debug!(tool = name, error = %e, "Rejected tool arguments");
        })?;

        tracing::debug!(tool = name, request_id = %ctx.request_id(), "Invoking tool");
        let outcome = tool.invoke(ctx, arguments).await;
        if let Err(e) = &outcome {
            tracing::warn!(tool = name, error = %e, "Tool call failed");
        }
        outcome
    }
}
