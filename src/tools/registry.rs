//! Static tool catalogue.

use crate::tools::schema::ArgumentSchema;
use rmcp::model::Tool;
use std::sync::Arc;

/// A registered tool: name, description and input schema.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ArgumentSchema,
}

impl ToolDescriptor {
    pub fn new(name: &'static str, description: &'static str, schema: ArgumentSchema) -> Self {
        Self {
            name,
            description,
            schema,
        }
    }

    /// MCP representation used in `tools/list`.
    pub fn to_mcp_tool(&self) -> Tool {
        Tool::new(
            self.name,
            self.description,
            Arc::new(self.schema.to_json_schema()),
        )
    }
}

/// Immutable, ordered set of tool descriptors.
///
/// Catalogue order is what clients see in `tools/list`.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        debug_assert!(
            {
                let mut names: Vec<_> = tools.iter().map(|t| t.name).collect();
                names.sort_unstable();
                names.windows(2).all(|w| w[0] != w[1])
            },
            "tool names must be unique"
        );
        Self { tools }
    }

    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.iter().map(|t| t.name)
    }
}
