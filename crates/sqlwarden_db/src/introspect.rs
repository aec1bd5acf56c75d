//! Live schema introspection.

use crate::error::Result;
use crate::schema::INTERNAL_TABLES;
use sqlwarden_guard::SchemaSnapshot;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

/// Reports the tables and views of the live database with their columns in
/// declaration order. SQLite internals and the gateway's own tables are
/// omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    pub async fn snapshot(&self, conn: &mut SqliteConnection) -> Result<SchemaSnapshot> {
        let tables: Vec<String> = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#,
        )
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<std::result::Result<_, _>>()?;

        let mut snapshot = SchemaSnapshot::new();
        for table in tables {
            if INTERNAL_TABLES
                .iter()
                .any(|internal| internal.eq_ignore_ascii_case(&table))
            {
                continue;
            }

            let columns: Vec<String> =
                sqlx::query("SELECT name FROM pragma_table_info(?) ORDER BY cid")
                    .bind(&table)
                    .fetch_all(&mut *conn)
                    .await?
                    .iter()
                    .map(|row| row.try_get::<String, _>("name"))
                    .collect::<std::result::Result<_, _>>()?;

            snapshot.insert(&table, columns);
        }

        Ok(snapshot)
    }
}
