//! Streamable HTTP transport for the MCP server.
//!
//! One `POST /mcp` carries one JSON-RPC message. The reply is framed one of
//! two ways, chosen before the first header is written:
//!
//! - **Buffered**: a single `application/json` document.
//! - **Event stream**: `text/event-stream`, one `message` event per JSON-RPC
//!   message. Progress notifications (when the client sent a progress token)
//!   come first; the response itself is the terminal event, after which the
//!   stream closes.
//!
//! The event stream is used when the client's `Accept` header lists
//! `text/event-stream` and the server is not configured for JSON-only replies.
//!
//! Each call runs on its own task with a cancellation token that fires if the
//! client goes away before the reply is written.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::trace::TraceLayer;

use crate::config::ResponseMode;
use crate::error::ErrorKind;
use crate::mcp::capture;
use crate::mcp::context::{CallContext, ProgressSink};
use crate::mcp::cors::{self, SESSION_ID_HEADER};
use crate::mcp::dispatcher::{Dispatcher, ToolCallRequest};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcReply, Method, OutgoingNotification,
    RequestId, SUPPORTED_PROTOCOL_VERSIONS,
};

/// Header carrying the protocol version on post-initialisation requests.
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// The endpoint path advertised by `/health`.
pub const MCP_ENDPOINT: &str = "/mcp";

/// Shared state threaded through all axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The request dispatcher (owns the frozen registry).
    pub dispatcher: Arc<Dispatcher>,
    /// Whether event-stream replies may be used.
    pub response_mode: ResponseMode,
}

impl AppState {
    /// Creates state with automatic framing.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            response_mode: ResponseMode::Auto,
        }
    }

    /// Overrides the framing policy.
    #[must_use]
    pub const fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = response_mode;
        self
    }
}

/// Builds the axum `Router` with all routes and middleware.
///
/// Layer order, outermost first: cross-origin (when enabled), request
/// tracing, body capture.
pub fn build_router(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        .route(MCP_ENDPOINT, post(handle_mcp))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .with_state(state)
        .layer(middleware::from_fn(capture::capture_bodies))
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(middleware::from_fn(cors::cors))
    } else {
        router
    }
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let info = state.dispatcher.server_info();
    Json(json!({
        "status": "ok",
        "server": info.name,
        "version": info.version,
        "mcp_endpoint": MCP_ENDPOINT,
    }))
}

async fn handle_not_found(uri: Uri) -> Response {
    tracing::debug!(path = uri.path(), "No route");
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Path {} not found. Try /health or /mcp", uri.path()),
        })),
    )
        .into_response()
}

async fn handle_mcp(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_message(&body) {
        Ok(IncomingMessage::Request(request)) => request,
        Ok(IncomingMessage::Notification(notification)) => {
            tracing::debug!(method = %notification.method, "Notification received");
            return StatusCode::ACCEPTED.into_response();
        }
        Err(error) => {
            tracing::warn!(code = error.error.code, message = %error.error.message, "Malformed request");
            let error = error.with_kind(ErrorKind::MalformedRequest);
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    };

    let request = ToolCallRequest::from(request);

    if request.method != Method::Initialize {
        if let Some(version) = unsupported_protocol_version(&headers) {
            tracing::warn!(version = %version, "Unsupported protocol version header");
            let error = JsonRpcError::invalid_request(
                Some(request.id),
                format!("unsupported protocol version: {version}"),
            )
            .with_kind(ErrorKind::MalformedRequest);
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    }

    let session_id = if request.method == Method::Initialize {
        Some(uuid::Uuid::new_v4().to_string())
    } else {
        headers
            .get(SESSION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    let streaming = state.response_mode == ResponseMode::Auto && accepts_event_stream(&headers);
    let cancel = CancellationToken::new();
    let id = request.id.clone();

    let mut response = if streaming {
        let (sender, receiver) = mpsc::unbounded_channel();
        let progress = request
            .progress_token
            .clone()
            .map(|token| ProgressSink::new(token, sender));
        let ctx = CallContext::new(id.clone())
            .with_session(session_id.clone())
            .with_cancellation(cancel.clone())
            .with_progress(progress);
        let task = spawn_dispatch(&state, request, ctx);

        let stream = event_stream(EventStreamState {
            id,
            receiver,
            task: Some(task),
            reply: None,
            _cancel_on_drop: cancel.drop_guard(),
        });
        Sse::new(stream)
            .keep_alive(KeepAlive::default())
            .into_response()
    } else {
        let _cancel_on_drop = cancel.clone().drop_guard();
        let ctx = CallContext::new(id.clone())
            .with_session(session_id.clone())
            .with_cancellation(cancel);
        match spawn_dispatch(&state, request, ctx).await {
            Ok(reply) => Json(reply).into_response(),
            Err(e) => {
                tracing::error!(id = %id, error = %e, "Dispatch task failed");
                let error = JsonRpcError::internal_error(Some(id), "Internal error")
                    .with_kind(ErrorKind::InternalFault);
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            }
        }
    };

    if let Some(session_id) = session_id.and_then(|s| HeaderValue::from_str(&s).ok()) {
        response.headers_mut().insert(SESSION_ID_HEADER, session_id);
    }
    response
}

fn spawn_dispatch(
    state: &AppState,
    request: ToolCallRequest,
    ctx: CallContext,
) -> JoinHandle<JsonRpcReply> {
    let dispatcher = Arc::clone(&state.dispatcher);
    tokio::spawn(async move { dispatcher.dispatch(request, &ctx).await })
}

/// Returns the offending value if the request names a version we do not speak.
fn unsupported_protocol_version(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(PROTOCOL_VERSION_HEADER)?;
    let version = value.to_str().unwrap_or_default().trim();
    if SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
        None
    } else {
        Some(version.to_string())
    }
}

/// Returns `true` if any `Accept` header lists `text/event-stream`.
#[must_use]
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|range| range.split(';').next())
        .any(|essence| essence.trim().eq_ignore_ascii_case("text/event-stream"))
}

struct EventStreamState {
    id: RequestId,
    receiver: mpsc::UnboundedReceiver<OutgoingNotification>,
    task: Option<JoinHandle<JsonRpcReply>>,
    reply: Option<JsonRpcReply>,
    _cancel_on_drop: DropGuard,
}

enum Step {
    Notify(OutgoingNotification),
    Finished(JsonRpcReply),
}

/// Progress events while the call runs, then the reply, then end of stream.
///
/// Dropping the stream (client disconnect) drops the guard and cancels the call.
fn event_stream(state: EventStreamState) -> impl Stream<Item = Result<Event, axum::Error>> {
    futures::stream::unfold(state, |mut state| async move {
        if let Some(task) = state.task.as_mut() {
            let step = tokio::select! {
                biased;
                Some(notification) = state.receiver.recv() => Step::Notify(notification),
                joined = task => Step::Finished(joined.unwrap_or_else(|e| {
                    tracing::error!(id = %state.id, error = %e, "Dispatch task failed");
                    JsonRpcError::internal_error(Some(state.id.clone()), "Internal error")
                        .with_kind(ErrorKind::InternalFault)
                        .into()
                })),
            };
            match step {
                Step::Notify(notification) => {
                    return Some((message_event(&notification), state));
                }
                Step::Finished(reply) => {
                    state.task = None;
                    state.reply = Some(reply);
                }
            }
        }

        // Progress sent just before the handler returned still precedes the reply.
        if let Ok(notification) = state.receiver.try_recv() {
            return Some((message_event(&notification), state));
        }

        let reply = state.reply.take()?;
        Some((message_event(&reply), state))
    })
}

fn message_event(message: &impl serde::Serialize) -> Result<Event, axum::Error> {
    Event::default().event("message").json_data(message)
}
