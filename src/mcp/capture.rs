//! Diagnostic capture of response bodies.
//!
//! Every response passes through [`capture_bodies`]. At the moment its headers
//! are final the capture decides, exactly once, whether the response is an
//! event stream. Buffered responses have their first [`CAPTURE_LIMIT`] bytes
//! copied aside and logged at `debug` when the body is finished; event streams
//! are passed through untouched and never recorded.
//!
//! Capture never alters what the client receives: chunks are observed on
//! their way out, not collected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use futures::StreamExt;

/// Maximum number of body bytes kept for diagnostics.
pub const CAPTURE_LIMIT: usize = 1024;

/// Where a response is in its capture lifecycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// Headers not yet committed.
    #[default]
    Undetermined,
    /// Ordinary response; holds at most [`CAPTURE_LIMIT`] bytes.
    Buffered(Vec<u8>),
    /// Event stream; nothing is recorded.
    Streaming,
}

/// Per-response capture state machine.
#[derive(Debug, Default)]
pub struct BodyCapture {
    state: CaptureState,
    seen: usize,
}

impl BodyCapture {
    /// Fixes the capture mode from the committed headers.
    ///
    /// Returns `false` (and changes nothing) if the mode was already fixed.
    pub fn commit_headers(&mut self, headers: &HeaderMap) -> bool {
        if self.state != CaptureState::Undetermined {
            return false;
        }
        self.state = if is_event_stream(headers) {
            CaptureState::Streaming
        } else {
            CaptureState::Buffered(Vec::new())
        };
        true
    }

    /// Observes one outgoing chunk.
    pub fn record(&mut self, chunk: &[u8]) {
        let CaptureState::Buffered(buffer) = &mut self.state else {
            return;
        };
        self.seen += chunk.len();
        let room = CAPTURE_LIMIT.saturating_sub(buffer.len());
        buffer.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    /// The bytes kept so far.
    #[must_use]
    pub fn captured(&self) -> &[u8] {
        match &self.state {
            CaptureState::Buffered(buffer) => buffer,
            _ => &[],
        }
    }

    /// Total bytes observed, including those past the cap.
    #[must_use]
    pub const fn bytes_seen(&self) -> usize {
        self.seen
    }

    /// Returns `true` once the response has been classified as an event stream.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state == CaptureState::Streaming
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> &CaptureState {
        &self.state
    }
}

/// Returns `true` if the committed `Content-Type` is `text/event-stream`.
#[must_use]
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("text/event-stream"))
}

/// Shared handle to one response's capture, stored in the response extensions.
#[derive(Debug, Clone, Default)]
pub struct CaptureHandle(Arc<Mutex<BodyCapture>>);

impl CaptureHandle {
    fn lock(&self) -> MutexGuard<'_, BodyCapture> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the bytes kept so far.
    #[must_use]
    pub fn captured(&self) -> Vec<u8> {
        self.lock().captured().to_vec()
    }

    /// Number of bytes kept so far.
    #[must_use]
    pub fn captured_len(&self) -> usize {
        self.lock().captured().len()
    }

    /// Total bytes observed.
    #[must_use]
    pub fn bytes_seen(&self) -> usize {
        self.lock().bytes_seen()
    }

    /// Returns `true` for event-stream responses.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.lock().is_streaming()
    }
}

/// Logs the capture once the body has been sent (or abandoned).
struct LogOnDrop {
    handle: CaptureHandle,
    label: String,
}

impl Drop for LogOnDrop {
    fn drop(&mut self) {
        let capture = self.handle.lock();
        tracing::debug!(
            request = %self.label,
            bytes = capture.bytes_seen(),
            body = %String::from_utf8_lossy(capture.captured()),
            "Response body"
        );
    }
}

/// Attaches a capture to `response`.
///
/// The returned response carries a [`CaptureHandle`] in its extensions.
#[must_use]
pub fn instrument(response: Response, label: String) -> Response {
    let handle = CaptureHandle::default();
    let streaming = {
        let mut capture = handle.lock();
        capture.commit_headers(response.headers());
        capture.is_streaming()
    };

    let (mut parts, body) = response.into_parts();
    parts.extensions.insert(handle.clone());

    if streaming {
        tracing::debug!(request = %label, "Event stream, body capture disabled");
        return Response::from_parts(parts, body);
    }

    let guard = LogOnDrop { handle, label };
    let observed = body.into_data_stream().map(move |chunk| {
        if let Ok(bytes) = &chunk {
            guard.handle.lock().record(bytes);
        }
        chunk
    });
    Response::from_parts(parts, Body::from_stream(observed))
}

/// Middleware wrapping every response in a diagnostic capture.
pub async fn capture_bodies(request: Request, next: Next) -> Response {
    let label = format!("{} {}", request.method(), request.uri().path());
    instrument(next.run(request).await, label)
}
