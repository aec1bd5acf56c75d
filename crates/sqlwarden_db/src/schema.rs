//! Schema creation for the gateway's own tables.
//!
//! All CREATE TABLE statements live here. Everything is `IF NOT EXISTS`, so
//! opening an existing database is a no-op.

use crate::error::Result;
use crate::WardenDb;
use tracing::info;

/// Tables owned by the gateway or its admin interface. They are never exposed
/// through introspection, so candidate SQL cannot target them.
pub const INTERNAL_TABLES: &[&str] = &["mcp_audit_logs", "users", "user_permissions"];

impl WardenDb {
    /// Ensure all gateway tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_audit_tables().await?;
        self.create_directory_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Append-only audit log, read newest first.
    async fn create_audit_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS mcp_audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                operation TEXT NOT NULL,
                table_name TEXT NOT NULL,
                sql_text TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_mcp_audit_logs_user_id ON mcp_audit_logs(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_mcp_audit_logs_operation ON mcp_audit_logs(operation)",
            "CREATE INDEX IF NOT EXISTS idx_mcp_audit_logs_table_name ON mcp_audit_logs(table_name)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Principals and their grants. Rows are managed by the external admin
    /// interface; the gateway only reads them.
    async fn create_directory_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'user')),
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS user_permissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                table_name TEXT NOT NULL,
                can_read INTEGER NOT NULL DEFAULT 0,
                can_write INTEGER NOT NULL DEFAULT 0,
                allowed_columns TEXT,
                UNIQUE (user_id, table_name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_permissions_user_id ON user_permissions(user_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
