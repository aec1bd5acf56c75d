//! MCP (Model Context Protocol) server for the sqlwarden gateway.
//!
//! # Architecture
//!
//! ```text
//!   Planner / AI assistant
//!           │  JSON-RPC over stdio
//!           ▼
//!   server ──► tools ──► gateway ──► sqlwarden_guard (validate)
//!                           │
//!                           └──────► sqlwarden_db (permissions, schema,
//!                                    execution, audit)
//! ```
//!
//! The [`Gateway`] owns request sequencing: one transaction per tool call and
//! one audit entry per execution attempt. The server and tools only translate
//! between JSON and gateway calls.

pub mod gateway;
pub mod plan;
pub mod protocol;
pub mod server;
pub mod tools;

pub use gateway::{
    CheckReport, CostReport, Gateway, GatewayConfig, PlanReport, ValidationSummary, WriteReport,
};
pub use plan::{CandidatePlan, PlanAction, PlanIntent, PlanOutcome, PlanStep, SqlTool};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use server::{McpServer, McpServerConfig};
pub use tools::{McpTool, ToolContext, ToolRegistry};
