//! Execute a candidate plan from a JSON file.

use crate::cli::config::WardenConfig;
use crate::cli::context::{open_gateway, resolve_principal, PrincipalArgs};
use anyhow::{Context, Result};
use sqlwarden_mcp::CandidatePlan;
use std::path::{Path, PathBuf};

pub struct PlanArgs {
    /// Plan file, `-` for stdin
    pub file: PathBuf,
}

pub fn read_plan(file: &Path) -> Result<CandidatePlan> {
    let text = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read plan from stdin")?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read plan {}", file.display()))?
    };
    serde_json::from_str(&text).context("Invalid plan JSON")
}

pub async fn run(config: &WardenConfig, principal: PrincipalArgs, args: PlanArgs) -> Result<()> {
    let plan = read_plan(&args.file)?;
    let gateway = open_gateway(config).await?;
    let principal = resolve_principal(&gateway, &principal).await?;

    let outcome = gateway
        .execute_plan(&principal, &plan)
        .await
        .context("Plan failed")?;
    crate::cli::print_json(&outcome)
}
