//! Candidate plans produced by the external planner.
//!
//! A plan is untrusted input: its intent decides whether any SQL runs at all,
//! and every action goes through the same gateway tool a direct call would.

use crate::gateway::Gateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlwarden_guard::{GatewayError, Principal, Result};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

pub const CHAT_REPLY: &str = "Hello! How can I help you with your data today?";
pub const VAGUE_REPLY: &str =
    "I could not clearly understand your request. Please rephrase it with more details.";
pub const FORBIDDEN_REPLY: &str =
    "You do not have permission to perform this operation on the requested data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanIntent {
    Chat,
    Vague,
    Forbidden,
    Db,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanAction {
    pub tool: String,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub intent: PlanIntent,
    #[serde(default)]
    pub actions: Vec<PlanAction>,
}

/// SQL tools a plan may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlTool {
    Validate,
    DryRun,
    RunRead,
    RunWrite,
    Explain,
    EstimateCost,
}

impl SqlTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlTool::Validate => "validate_query",
            SqlTool::DryRun => "dry_run_query",
            SqlTool::RunRead => "run_read_query",
            SqlTool::RunWrite => "run_write_query",
            SqlTool::Explain => "explain_query",
            SqlTool::EstimateCost => "estimate_query_cost",
        }
    }
}

impl fmt::Display for SqlTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlTool {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "validate_query" => Ok(SqlTool::Validate),
            "dry_run_query" => Ok(SqlTool::DryRun),
            "run_read_query" => Ok(SqlTool::RunRead),
            "run_write_query" => Ok(SqlTool::RunWrite),
            "explain_query" => Ok(SqlTool::Explain),
            "estimate_query_cost" => Ok(SqlTool::EstimateCost),
            other => Err(GatewayError::validation(format!("unknown tool: {}", other))),
        }
    }
}

/// One executed action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    pub tool: String,
    pub sql: String,
    pub result: Value,
}

/// Outcome of a plan. `data` holds the last step's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub text: Option<String>,
    pub data: Option<Value>,
    pub steps: Vec<PlanStep>,
}

impl PlanOutcome {
    fn reply(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            data: None,
            steps: Vec::new(),
        }
    }
}

impl Gateway {
    /// Run a candidate plan for `principal`. Actions run in order and the
    /// first failure aborts the rest.
    pub async fn execute_plan(&self, principal: &Principal, plan: &CandidatePlan) -> Result<PlanOutcome> {
        info!(user_id = principal.id, intent = ?plan.intent, actions = plan.actions.len(), "Executing plan");

        match plan.intent {
            PlanIntent::Chat => return Ok(PlanOutcome::reply(CHAT_REPLY)),
            PlanIntent::Vague => return Ok(PlanOutcome::reply(VAGUE_REPLY)),
            PlanIntent::Forbidden => return Ok(PlanOutcome::reply(FORBIDDEN_REPLY)),
            PlanIntent::Db => {}
        }

        let mut steps = Vec::with_capacity(plan.actions.len());
        for action in &plan.actions {
            let tool: SqlTool = action.tool.parse()?;
            let sql = action
                .sql
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| GatewayError::validation(format!("action '{}' has no SQL", tool)))?;

            debug!(tool = %tool, reason = ?action.reason, "Plan step");
            let result = self.call_sql_tool(principal, tool, sql).await?;
            steps.push(PlanStep {
                tool: tool.to_string(),
                sql: sql.to_string(),
                result,
            });
        }

        Ok(PlanOutcome {
            text: None,
            data: steps.last().map(|s| s.result.clone()),
            steps,
        })
    }

    /// Dispatch one SQL tool and serialize its result.
    pub async fn call_sql_tool(&self, principal: &Principal, tool: SqlTool, sql: &str) -> Result<Value> {
        match tool {
            SqlTool::Validate => to_value(self.validate_query(principal, sql).await?),
            SqlTool::DryRun => to_value(self.dry_run_query(principal, sql).await?),
            SqlTool::RunRead => to_value(self.run_read_query(principal, sql).await?),
            SqlTool::RunWrite => to_value(self.run_write_query(principal, sql).await?),
            SqlTool::Explain => to_value(self.explain_query(principal, sql).await?),
            SqlTool::EstimateCost => to_value(self.estimate_query_cost(principal, sql).await?),
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::internal(format!("result serialization failed: {}", e)))
}
