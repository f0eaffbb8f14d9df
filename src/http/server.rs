//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::{router, ServiceState};
use crate::error::{Result, TurnstileError};
use crate::ratelimit::{PolicyRegistry, RateLimiterBackend};

/// HTTP server for the rate limit check service.
pub struct HttpServer<R: RateLimiterBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared handler state
    state: Arc<ServiceState<R>>,
}

impl<R: RateLimiterBackend + 'static> HttpServer<R> {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<R>, policies: Arc<PolicyRegistry>) -> Self {
        Self {
            addr,
            state: Arc::new(ServiceState::new(rate_limiter, policies)),
        }
    }

    /// Address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Starting HTTP server for rate limit checks");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                TurnstileError::Io(e)
            })
    }
}
