//! Stdio transport for the MCP servers.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::db::ResourcePool;
use crate::error::{ToolError, ToolResult};
use crate::mcp::McpService;
use crate::tools::Toolset;
use crate::transport::{Transport, close_pool, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

/// Stdio transport implementation.
///
/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport<T: Toolset> {
    service: McpService<T>,
    pool: Option<Arc<ResourcePool>>,
}

impl<T: Toolset> StdioTransport<T> {
    /// Create a stdio transport. `pool` is closed on shutdown.
    pub fn new(service: McpService<T>, pool: Option<Arc<ResourcePool>>) -> Self {
        Self { service, pool }
    }
}

impl<T: Toolset> Transport for StdioTransport<T> {
    async fn run(&self) -> ToolResult<()> {
        info!("Starting MCP server with stdio transport");

        let running_service = self
            .service
            .clone()
            .serve(stdio())
            .await
            .map_err(|e| ToolError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        close_pool(self.pool.as_ref()).await;
                        return Err(ToolError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        close_pool(self.pool.as_ref()).await;

        if shutdown_requested {
            // stdin reads block; select! cannot interrupt them
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessRunner;
    use crate::tools::DevopsToolset;

    #[test]
    fn test_stdio_transport_creation() {
        let service = McpService::new(Arc::new(DevopsToolset::new(ProcessRunner::new("."))));
        let transport = StdioTransport::new(service, None);
        assert_eq!(transport.name(), "stdio");
    }
}
