//! Ops MCP Server - Main entry point.
//!
//! Runs either the database server (pooled PostgreSQL/SQLite tools) or the
//! devops server (build and ops command wrappers) over stdio or HTTP.

use clap::Parser;
use ops_mcp_server::config::{Config, ServerKind, TransportMode};
use ops_mcp_server::db::{ResourcePool, StatementExecutor};
use ops_mcp_server::mcp::McpService;
use ops_mcp_server::process::ProcessRunner;
use ops_mcp_server::tools::{DatabaseToolset, DevopsToolset, Toolset};
use ops_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr: stdout carries the protocol on the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    info!(
        server = %config.server,
        transport = %config.transport,
        "Starting Ops MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    match config.server {
        ServerKind::Database => run_database(&config).await,
        ServerKind::Devops => {
            let runner = ProcessRunner::new(&config.workspace_dir);
            info!(workspace = %runner.workspace_dir().display(), "Devops tools ready");
            serve(&config, Arc::new(DevopsToolset::new(runner)), None).await
        }
    }
}

async fn run_database(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let settings = config.database_settings()?;
    info!(url = %settings.redacted_url(), "Connecting to database");

    let pool = Arc::new(ResourcePool::new(settings));
    let executor = Arc::new(StatementExecutor::new(pool.clone()));

    if !pool.ensure_ready().await {
        error!(
            establishments = pool.establish_attempts(),
            "Failed to connect to database"
        );
        std::process::exit(1);
    }
    info!(
        establishments = pool.establish_attempts(),
        backend = ?pool.backend(),
        "Database pool ready"
    );

    if config.check_connection {
        let ok = check_connection(&DatabaseToolset::new(executor)).await;
        pool.close().await;
        std::process::exit(if ok { 0 } else { 1 });
    }

    serve(config, Arc::new(DatabaseToolset::new(executor)), Some(pool)).await
}

/// Print the server version and table listing, as a deployment smoke test.
async fn check_connection(toolset: &DatabaseToolset) -> bool {
    let executor = toolset.executor();
    match executor.driver_version().await {
        Ok(version) => println!("Connected: {}", version),
        Err(e) => {
            println!("Connection check failed: {}", e);
            return false;
        }
    }

    match toolset.list_tables().await {
        Ok(output) => {
            println!("Tables:");
            for block in &output.content {
                println!("{}", block.render());
            }
            true
        }
        Err(e) => {
            println!("Listing tables failed: {}", e);
            false
        }
    }
}

async fn serve<T: Toolset>(
    config: &Config,
    toolset: Arc<T>,
    pool: Option<Arc<ResourcePool>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = McpService::new(toolset);

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(service, pool).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                pool,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
