//! Schema and grant lookups.

use super::*;
use serde_json::json;

pub struct GetSchemaTool;

#[async_trait]
impl McpTool for GetSchemaTool {
    fn name(&self) -> &'static str {
        "get_schema"
    }

    fn description(&self) -> &'static str {
        "List the tables you can read and their visible columns."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext<'_>) -> Result<Value> {
        to_value(ctx.gateway.get_schema(ctx.principal).await?)
    }
}

pub struct GetUserPermissionsTool;

#[async_trait]
impl McpTool for GetUserPermissionsTool {
    fn name(&self) -> &'static str {
        "get_user_permissions"
    }

    fn description(&self) -> &'static str {
        "List your table grants. Admins may pass user_id to inspect another user."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": {
                    "type": "integer",
                    "description": "User to inspect (admin only; ignored otherwise)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<Value> {
        let user_id = optional_param!(args, "user_id", i64);
        to_value(
            ctx.gateway
                .get_user_permissions(ctx.principal, user_id)
                .await?,
        )
    }
}
