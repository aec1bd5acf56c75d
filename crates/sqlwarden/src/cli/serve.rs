//! MCP server launcher
//!
//! Serves the gateway tools over stdio using JSON-RPC, bound to one principal.

use crate::cli::config::WardenConfig;
use crate::cli::context::{open_gateway, resolve_principal, PrincipalArgs};
use anyhow::Result;
use sqlwarden_mcp::McpServer;
use tracing::info;

pub async fn run(config: &WardenConfig, principal: PrincipalArgs) -> Result<()> {
    let gateway = open_gateway(config).await?;
    let principal = resolve_principal(&gateway, &principal).await?;

    let mut server = McpServer::new(config.server_config(), gateway.clone(), principal);
    info!(database = %config.database.path.display(), "MCP server starting via stdio");

    let result = server.run_stdio().await;
    gateway.db().clone().close().await;
    result
}
