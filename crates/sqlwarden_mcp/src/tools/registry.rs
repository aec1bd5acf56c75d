//! Tool Registry - Tool Discovery and Dispatch
//!
//! Maintains the list of available tools and dispatches calls by name.

use super::audit::AuditHistoryTool;
use super::catalog::{GetSchemaTool, GetUserPermissionsTool};
use super::query::QueryTool;
use super::*;
use sqlwarden_guard::GatewayError;
use std::collections::HashMap;
use tracing::debug;

/// Registry of available MCP tools
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn McpTool>>,
}

impl ToolRegistry {
    /// Create a new tool registry with all tools registered
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        for tool in QueryTool::all() {
            registry.register(Box::new(tool));
        }
        registry.register(Box::new(AuditHistoryTool));
        registry.register(Box::new(GetSchemaTool));
        registry.register(Box::new(GetUserPermissionsTool));

        debug!("Registered {} tools", registry.tools.len());

        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        let name = tool.name().to_string();
        debug!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    /// All tool definitions, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut tools: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value, ctx: &ToolContext<'_>) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| GatewayError::validation(format!("Unknown tool: {}", name)))?;

        tool.execute(args, ctx).await
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
