//! Print audit history.

use crate::cli::config::WardenConfig;
use crate::cli::context::{open_gateway, resolve_principal, PrincipalArgs};
use anyhow::{Context, Result};
use sqlwarden_db::AuditQuery;

pub struct AuditArgs {
    pub user: Option<i64>,
    pub table: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn run(config: &WardenConfig, principal: PrincipalArgs, args: AuditArgs) -> Result<()> {
    let gateway = open_gateway(config).await?;
    let principal = resolve_principal(&gateway, &principal).await?;

    let records = gateway
        .audit_query_history(
            &principal,
            AuditQuery {
                user_id: args.user,
                table_name: args.table,
                limit: args.limit,
                offset: args.offset,
            },
        )
        .await
        .context("Failed to read audit history")?;
    crate::cli::print_json(&records)
}
