//! Validate one statement for a principal without executing it.

use crate::cli::config::WardenConfig;
use crate::cli::context::{open_gateway, resolve_principal, PrincipalArgs};
use anyhow::{Context, Result};

pub struct CheckArgs {
    pub sql: String,
}

pub async fn run(config: &WardenConfig, principal: PrincipalArgs, args: CheckArgs) -> Result<()> {
    let gateway = open_gateway(config).await?;
    let principal = resolve_principal(&gateway, &principal).await?;

    let report = gateway
        .check_query(&principal, &args.sql)
        .await
        .context("Statement rejected")?;
    crate::cli::print_json(&report)
}
