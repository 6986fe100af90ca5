//! MCP server integration module.
//!
//! Bridges the MCP protocol (via rmcp) and the tool dispatcher.

pub mod service;

pub use service::McpService;
