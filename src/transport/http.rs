//! HTTP transport with Streamable HTTP support for the MCP servers.

use crate::db::ResourcePool;
use crate::error::{ToolError, ToolResult};
use crate::mcp::McpService;
use crate::tools::Toolset;
use crate::transport::{Transport, close_pool, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// SSE connections can keep the server alive; force exit after this.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
pub struct HttpTransport<T: Toolset> {
    service: McpService<T>,
    pool: Option<Arc<ResourcePool>>,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl<T: Toolset> HttpTransport<T> {
    pub fn new(
        service: McpService<T>,
        pool: Option<Arc<ResourcePool>>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service,
            pool,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Resolves once draining should be abandoned: after [`GRACEFUL_TIMEOUT`] or
/// a second signal, whichever comes first.
async fn drain_deadline(stopping: &Notify) {
    stopping.notified().await;
    info!(
        timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Draining open streams (signal again to force exit)"
    );

    tokio::select! {
        _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => warn!("Drain timed out, forcing exit"),
        _ = wait_for_signal() => warn!("Second signal received, forcing exit"),
    }
}

impl<T: Toolset> Transport for HttpTransport<T> {
    async fn run(&self) -> ToolResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        // Every session gets a clone sharing the same dispatcher and pool.
        let template = self.service.clone();
        let service = StreamableHttpService::new(
            move || Ok(template.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service doesn't support the root path
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ToolError::internal(format!(
                "Failed to bind to {}: {} (check that the port is available)",
                bind_addr, e
            ))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let stopping = Arc::new(Notify::new());
        let server = axum::serve(listener, app).with_graceful_shutdown({
            let stopping = stopping.clone();
            async move {
                wait_for_signal().await;
                stopping.notify_one();
            }
        });

        let outcome = tokio::select! {
            result = server => result.map_err(|e| {
                error!(error = %e, "HTTP server error");
                ToolError::internal(format!("HTTP server error: {}", e))
            }),
            _ = drain_deadline(&stopping) => Ok(()),
        };

        close_pool(self.pool.as_ref()).await;
        if outcome.is_ok() {
            info!("HTTP server stopped");
        }
        outcome
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
