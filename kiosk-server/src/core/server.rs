//! Server Implementation
//!
//! HTTP 服务器启动和管理

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::core::{Config, Result, ServerState};

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the Axum router with all routes and middleware
///
/// Compression skips `text/event-stream`, so the order stream is never
/// buffered by the gzip encoder.
pub fn build_app(state: ServerState) -> Router {
    Router::<ServerState>::new()
        .merge(crate::api::health::router())
        .merge(crate::api::orders::router())
        .with_state(state)
        // Tower HTTP 中间件
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        // HTTP 请求日志中间件
        .layer(middleware::from_fn(log_request))
}

/// Wait for Ctrl+C (and SIGTERM on unix)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    /// Create server with existing state
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("💊 Kiosk server listening on {}", addr);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `signal` resolves
    ///
    /// On shutdown the event bus is closed first so open streams end, then
    /// in-flight requests get `shutdown_timeout` to finish.
    pub async fn serve<F>(&self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_app(self.state.clone());
        let bus = self.state.bus.clone();
        let stopping = CancellationToken::new();
        let stopping_signal = stopping.clone();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.await;
                tracing::info!("Shutting down...");
                bus.shutdown();
                stopping_signal.cancel();
            })
            .into_future();

        let timeout = self.config.shutdown_timeout();
        tokio::select! {
            result = serve => result?,
            _ = async {
                stopping.cancelled().await;
                tokio::time::sleep(timeout).await;
            } => {
                tracing::warn!(timeout_ms = self.config.shutdown_timeout_ms, "Graceful shutdown timed out");
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}
