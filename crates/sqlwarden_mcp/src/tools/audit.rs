use super::*;
use serde_json::json;
use sqlwarden_db::AuditQuery;

pub struct AuditHistoryTool;

#[async_trait]
impl McpTool for AuditHistoryTool {
    fn name(&self) -> &'static str {
        "audit_query_history"
    }

    fn description(&self) -> &'static str {
        "Read the audit trail of executed statements, newest first. Non-admins \
         only see their own entries."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user_id": { "type": "integer", "description": "Filter by user (admin only)" },
                "table_name": { "type": "string", "description": "Case-insensitive substring of the table name" },
                "limit": { "type": "integer", "minimum": 1, "default": 100 },
                "offset": { "type": "integer", "minimum": 0, "default": 0 }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<Value> {
        let defaults = AuditQuery::default();
        let query = AuditQuery {
            user_id: optional_param!(args, "user_id", i64),
            table_name: optional_param!(args, "table_name", String),
            limit: optional_param!(args, "limit", i64).unwrap_or(defaults.limit),
            offset: optional_param!(args, "offset", i64).unwrap_or(defaults.offset),
        };
        to_value(ctx.gateway.audit_query_history(ctx.principal, query).await?)
    }
}
