//! MCP Tool Implementations
//!
//! Each tool is a thin adapter from JSON arguments to one [`Gateway`]
//! operation. Tools are registered in the [`ToolRegistry`] and dispatched by
//! name.
//!
//! # Tool Categories
//!
//! - **Query**: validate_query, dry_run_query, explain_query,
//!   estimate_query_cost, run_read_query, run_write_query
//! - **Catalog**: get_schema, get_user_permissions
//! - **Audit**: audit_query_history

mod audit;
mod catalog;
mod query;
mod registry;

pub use registry::ToolRegistry;

use crate::gateway::Gateway;
use crate::protocol::ToolDefinition;
use async_trait::async_trait;
use serde_json::Value;
use sqlwarden_guard::{Principal, Result};

/// What a tool runs against: the gateway and the principal the session is
/// bound to.
pub struct ToolContext<'a> {
    pub gateway: &'a Gateway,
    pub principal: &'a Principal,
}

#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "run_read_query")
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<Value>;

    /// Get the tool definition for tools/list
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

// Macro to reduce boilerplate for tool parameter handling
macro_rules! require_param {
    ($args:expr, $name:literal, $ty:ty) => {
        serde_json::from_value::<$ty>($args.get($name).cloned().unwrap_or(serde_json::Value::Null)).map_err(
            |e| {
                sqlwarden_guard::GatewayError::validation(format!(
                    "Invalid parameter '{}': {}",
                    $name, e
                ))
            },
        )?
    };
}

/// Like `require_param!`, but absent or null yields `None`.
macro_rules! optional_param {
    ($args:expr, $name:literal, $ty:ty) => {
        require_param!($args, $name, Option<$ty>)
    };
}

pub(crate) use optional_param;
pub(crate) use require_param;

pub(crate) fn to_value<T: serde::Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| {
        sqlwarden_guard::GatewayError::internal(format!("result serialization failed: {}", e))
    })
}
