//! Grant loading. Grants are re-read on every request, never cached.

use crate::error::{DbError, Result};
use sqlwarden_guard::{PermissionMap, PermissionRecord, Principal, Role};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionStore;

impl PermissionStore {
    /// All grants of `user_id`, keyed by table.
    pub async fn load(&self, conn: &mut SqliteConnection, user_id: i64) -> Result<PermissionMap> {
        Ok(PermissionMap::from_records(self.list(conn, user_id).await?))
    }

    /// All grants of `user_id` ordered by table name.
    pub async fn list(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Vec<PermissionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, table_name, can_read, can_write, allowed_columns
            FROM user_permissions
            WHERE user_id = ?
            ORDER BY table_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(row_to_permission).collect()
    }

    /// Resolve a principal's role from the directory, `None` for unknown ids.
    pub async fn principal(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Option<Principal>> {
        let row = sqlx::query("SELECT id, role FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let role: String = row.try_get("role")?;
                let role: Role = role.parse().map_err(|e: String| DbError::constraint(e))?;
                Ok(Some(Principal::new(row.try_get("id")?, role)))
            }
            None => Ok(None),
        }
    }
}

fn row_to_permission(row: &SqliteRow) -> Result<PermissionRecord> {
    let allowed_columns = match row.try_get::<Option<String>, _>("allowed_columns")? {
        Some(raw) => serde_json::from_str::<Option<Vec<String>>>(&raw)?,
        None => None,
    };

    Ok(PermissionRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        table_name: row.try_get("table_name")?,
        can_read: row.try_get("can_read")?,
        can_write: row.try_get("can_write")?,
        allowed_columns,
    })
}
