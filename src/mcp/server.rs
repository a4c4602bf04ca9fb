//! HTTP listener lifecycle.
//!
//! 1. **Bind**: open the TCP listener on the resolved address
//! 2. **Serve**: hand connections to the router, one task per request
//! 3. **Shutdown**: stop accepting on SIGINT/SIGTERM (Ctrl+C on Windows) and
//!    let in-flight requests finish

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::ServeError;

/// An MCP server bound to one address.
#[derive(Debug)]
pub struct McpHttpServer {
    addr: SocketAddr,
    router: Router,
}

impl McpHttpServer {
    /// Creates a server for `router` on `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr, router: Router) -> Self {
        Self { addr, router }
    }

    /// The configured listen address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds and serves until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP bind fails or the server loop fails.
    pub async fn run(self) -> Result<(), ServeError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServeError::Bind {
                addr: self.addr.to_string(),
                source: e,
            })?;

        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the server loop fails.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServeError> {
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local, "MCP HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServeError::Serve)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Resolves when the process is asked to stop.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        tracing::warn!("Could not install signal handlers, shutdown only by kill");
        return std::future::pending::<()>().await;
    };

    tokio::select! {
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

/// Resolves when the process is asked to stop.
#[cfg(windows)]
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    } else {
        tracing::warn!("Could not install Ctrl+C handler, shutdown only by kill");
        std::future::pending::<()>().await;
    }
}
