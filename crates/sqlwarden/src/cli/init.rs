//! Create gateway storage, optionally seeding the demo dataset.

use crate::cli::config::WardenConfig;
use anyhow::{Context, Result};
use serde_json::json;
use sqlwarden_db::{WardenDb, DEMO_ADMIN_EMAIL, DEMO_USER_EMAIL};
use tracing::info;

pub struct InitArgs {
    pub demo: bool,
}

pub async fn run(config: &WardenConfig, args: InitArgs) -> Result<()> {
    let path = &config.database.path;
    let db = WardenDb::open(&config.db_config())
        .await
        .with_context(|| format!("Failed to create database {}", path.display()))?;

    let mut report = json!({ "database": path.display().to_string() });
    if args.demo {
        let users = db.seed_demo().await.context("Failed to seed demo data")?;
        info!(admin_id = users.admin_id, user_id = users.user_id, "Demo data seeded");
        report["demo_users"] = json!([
            { "id": users.admin_id, "email": DEMO_ADMIN_EMAIL, "role": "admin" },
            { "id": users.user_id, "email": DEMO_USER_EMAIL, "role": "user" },
        ]);
    }

    db.close().await;
    crate::cli::print_json(&report)
}
