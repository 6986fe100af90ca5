//! MCP service implementation using rmcp.
//!
//! [`McpService`] adapts a [`Dispatcher`] to the MCP protocol: `tools/list`
//! renders the toolset's registry and `tools/call` runs the dispatcher. Tool
//! failures are reported as `CallToolResult` errors, never as protocol errors.

use crate::tools::dispatch::{Dispatcher, Request, Response, Toolset};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
};
use std::sync::Arc;

pub struct McpService<T: Toolset> {
    dispatcher: Dispatcher<T>,
}

impl<T: Toolset> Clone for McpService<T> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<T: Toolset> McpService<T> {
    pub fn new(toolset: Arc<T>) -> Self {
        Self {
            dispatcher: Dispatcher::new(toolset),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    /// Run one tool call and convert the outcome to an MCP result.
    pub async fn call(&self, request: Request) -> CallToolResult {
        into_call_result(self.dispatcher.dispatch(request).await)
    }
}

/// Convert a dispatcher response to an MCP tool result.
pub fn into_call_result(response: Response) -> CallToolResult {
    match response {
        Response::Success { content } => CallToolResult::success(
            content
                .iter()
                .map(|block| Content::text(block.render()))
                .collect(),
        ),
        Response::Failure { message } => CallToolResult::error(vec![Content::text(message)]),
    }
}

impl<T: Toolset> ServerHandler for McpService<T> {
    fn get_info(&self) -> ServerInfo {
        let toolset = self.dispatcher.toolset();
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: toolset.server_name().to_owned(),
                title: toolset.title().map(str::to_owned),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(toolset.instructions().to_owned()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self
                .dispatcher
                .registry()
                .list()
                .iter()
                .map(|t| t.to_mcp_tool())
                .collect(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let request = Request::new(request.name, request.arguments.unwrap_or_default());
        Ok(self.call(request).await)
    }
}
