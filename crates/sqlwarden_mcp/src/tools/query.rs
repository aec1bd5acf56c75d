//! SQL tools. All six share one input shape: `{ "sql": string }`.

use super::*;
use crate::plan::SqlTool;
use serde_json::json;

pub struct QueryTool {
    tool: SqlTool,
}

impl QueryTool {
    pub fn new(tool: SqlTool) -> Self {
        Self { tool }
    }

    pub fn all() -> Vec<Self> {
        [
            SqlTool::Validate,
            SqlTool::DryRun,
            SqlTool::Explain,
            SqlTool::EstimateCost,
            SqlTool::RunRead,
            SqlTool::RunWrite,
        ]
        .into_iter()
        .map(Self::new)
        .collect()
    }
}

#[async_trait]
impl McpTool for QueryTool {
    fn name(&self) -> &'static str {
        self.tool.as_str()
    }

    fn description(&self) -> &'static str {
        match self.tool {
            SqlTool::Validate => {
                "Validate a SQL statement against your permissions without running it. \
                 Returns the operation, table, permitted columns and effective limit."
            }
            SqlTool::DryRun => {
                "Show the query plan of the statement exactly as it would be executed, \
                 with column restrictions and row limit applied. No data is read."
            }
            SqlTool::Explain => "Show the query plan of a validated statement. No data is read.",
            SqlTool::EstimateCost => {
                "Estimate the cost of a validated statement from the query planner. \
                 Returns startup_cost, total_cost and plan_rows."
            }
            SqlTool::RunRead => {
                "Run a SELECT on a single table. Columns are restricted to those you may \
                 read and the row count is capped."
            }
            SqlTool::RunWrite => {
                "Run an INSERT, UPDATE or DELETE on a single table. UPDATE and DELETE \
                 require a WHERE clause. Returns rows_affected."
            }
        }
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single SQL statement"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<Value> {
        let sql = require_param!(args, "sql", String);
        ctx.gateway.call_sql_tool(ctx.principal, self.tool, &sql).await
    }
}
