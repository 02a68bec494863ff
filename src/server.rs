//! HTTP server hosting the guarded chat routes.

use std::net::SocketAddr;

use axum::http::{Method, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{ChatGuardError, Result};
use crate::middleware::ChatGuard;

/// Router with the stand-in chat handler behind the guard.
///
/// Every path other than `/health` is answered by a handler that accepts
/// the request and echoes its method and path.
pub fn chat_app(guard: &ChatGuard) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .fallback(accept_handler);
    guard.apply(router)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn accept_handler(method: Method, uri: Uri) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "accepted",
        "method": method.as_str(),
        "path": uri.path()
    }))
}

/// HTTP server bound to a listen address.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind the listen address.
    pub async fn bind(addr: SocketAddr, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(addr = %addr, error = %e, "Failed to bind HTTP listener");
            ChatGuardError::Server(format!("failed to bind {}: {}", addr, e))
        })?;
        Ok(Self { listener, router })
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr()?, "Starting HTTP server");

        let service = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(self.listener, service)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                ChatGuardError::Io(e)
            })
    }
}
