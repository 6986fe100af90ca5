//! Ops MCP Server Library
//!
//! MCP (Model Context Protocol) servers for the gamification platform: a
//! database server backed by a shared connection pool, and a devops server
//! wrapping the monorepo's build and ops commands.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod process;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{ToolError, ToolResult};
pub use mcp::McpService;
