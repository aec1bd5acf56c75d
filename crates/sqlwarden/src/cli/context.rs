//! Shared setup: open the database, build the gateway, resolve the caller.

use crate::cli::config::WardenConfig;
use anyhow::{Context, Result};
use clap::Args;
use sqlwarden_db::WardenDb;
use sqlwarden_guard::{Principal, Role};
use sqlwarden_mcp::Gateway;
use tracing::debug;

/// Who the command acts as.
#[derive(Args, Debug, Clone)]
pub struct PrincipalArgs {
    /// Id of the acting user
    #[arg(long, env = "SQLWARDEN_USER_ID")]
    pub user_id: i64,

    /// Role of the acting user; looked up in the users table when omitted
    #[arg(long, env = "SQLWARDEN_ROLE")]
    pub role: Option<Role>,
}

pub async fn open_gateway(config: &WardenConfig) -> Result<Gateway> {
    let db_config = config.db_config().existing_only();
    let db = WardenDb::open(&db_config).await.with_context(|| {
        format!(
            "Failed to open database {} (run `sqlwarden init` first)",
            config.database.path.display()
        )
    })?;
    Ok(Gateway::new(db, config.gateway_config()))
}

pub async fn resolve_principal(gateway: &Gateway, args: &PrincipalArgs) -> Result<Principal> {
    let principal = match args.role {
        Some(role) => Principal::new(args.user_id, role),
        None => gateway
            .resolve_principal(args.user_id)
            .await
            .with_context(|| format!("Failed to resolve user {}", args.user_id))?,
    };
    debug!(user_id = principal.id, role = %principal.role, "Principal resolved");
    Ok(principal)
}
