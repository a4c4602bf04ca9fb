//! Per-call context handed to every tool handler.
//!
//! A context lives exactly as long as one `tools/call` request. It carries the
//! request identity, a cancellation token that fires when the client goes
//! away, and (on event-stream responses only) a sink for progress updates.

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::mcp::protocol::{OutgoingNotification, RequestId};

/// Where progress notifications for one call are delivered.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    token: Value,
    sender: mpsc::UnboundedSender<OutgoingNotification>,
}

impl ProgressSink {
    /// Creates a sink that tags every notification with `token`.
    #[must_use]
    pub const fn new(token: Value, sender: mpsc::UnboundedSender<OutgoingNotification>) -> Self {
        Self { token, sender }
    }
}

/// Request-scoped context for a tool handler.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: RequestId,
    session_id: Option<String>,
    cancel: CancellationToken,
    progress: Option<ProgressSink>,
}

impl CallContext {
    /// Creates a context with a fresh, uncancelled token and no progress sink.
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            session_id: None,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Attaches the client's session identifier.
    #[must_use]
    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Replaces the cancellation token (the transport owns the parent).
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attaches a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Option<ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// The id of the request this call belongs to.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The session identifier the client presented, if any.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns `true` once the client has gone away.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the call is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Emits a progress notification if the client asked for progress.
    ///
    /// Delivery is best-effort: a closed stream drops the update silently.
    pub fn report_progress(&self, progress: u32, total: Option<u32>, message: &str) {
        let Some(sink) = &self.progress else {
            return;
        };
        let notification =
            OutgoingNotification::progress(&sink.token, progress, total, Some(message));
        if sink.sender.send(notification).is_err() {
            tracing::trace!(request_id = %self.request_id, "progress dropped, stream closed");
        }
    }
}
